//! # Transports
//!
//! Socket constructors for [`Connection`](crate::connection::Connection) and
//! the shutdown capability used to close a connection from another thread.
//!
//! Any `Read` + `Write` pair can be adopted; sockets additionally support
//! [`TransportShutdown`], so closing unblocks a thread stuck in a read.

use std::io;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

pub mod tcp;
#[cfg(unix)]
pub mod unix;

/// Releases a transport so that blocked reads and writes on its other
/// handles return promptly.
pub trait TransportShutdown: Send + Sync {
    fn shutdown(&self) -> io::Result<()>;
}

impl TransportShutdown for TcpStream {
    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, std::net::Shutdown::Both)
    }
}

#[cfg(unix)]
impl TransportShutdown for std::os::unix::net::UnixStream {
    fn shutdown(&self) -> io::Result<()> {
        std::os::unix::net::UnixStream::shutdown(self, std::net::Shutdown::Both)
    }
}

/// Shared open/closed state of one connection.
///
/// Cloned into both halves and handed out to other threads; closing through
/// any clone closes the connection for all of them. Blocking I/O is released
/// by the transport shutdown, async I/O by the cancellation token.
#[derive(Clone)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    transport: Option<Arc<dyn TransportShutdown>>,
}

impl std::fmt::Debug for CloseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseHandle")
            .field("closed", &self.is_closed())
            .field("shutdown_capable", &self.transport.is_some())
            .finish()
    }
}

impl CloseHandle {
    pub fn new(transport: Option<Arc<dyn TransportShutdown>>) -> Self {
        Self {
            closed: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            transport,
        }
    }

    /// Never blocks; reflects local state only, not peer liveness.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolves once the connection has been closed through any clone
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Mark the connection closed and shut the transport down.
    ///
    /// Pending async operations on either half return `ConnectionClosed`.
    ///
    /// Only the first call does anything.
    pub fn close(&self) -> io::Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("Closing connection");
        self.cancel.cancel();
        match &self.transport {
            Some(transport) => match transport.shutdown() {
                // The peer may already have torn the socket down
                Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
                other => other,
            },
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingShutdown {
        calls: AtomicUsize,
    }

    impl TransportShutdown for CountingShutdown {
        fn shutdown(&self) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_close_runs_once() {
        let transport = Arc::new(CountingShutdown::default());
        let handle = CloseHandle::new(Some(transport.clone()));
        let other = handle.clone();

        assert!(!handle.is_closed());
        other.close().unwrap();
        handle.close().unwrap();

        assert!(handle.is_closed());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_wakes_waiters() {
        let handle = CloseHandle::new(None);
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        handle.close().unwrap();
        task.await.unwrap();
        assert!(handle.is_closed());
    }
}
