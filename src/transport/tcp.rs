//! TCP-backed connections.

use crate::connection::{Connection, ConnectionBuilder};
use crate::error::Result;
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{info, instrument};

/// Blocking connection over a TCP socket
pub type TcpConnection = Connection<TcpStream, TcpStream>;

impl ConnectionBuilder {
    /// Connect to `host:port` and wrap the socket.
    #[instrument(skip(self))]
    pub fn open(self, host: &str, port: u16) -> Result<TcpConnection> {
        let stream = TcpStream::connect((host, port))?;
        info!(host, port, "Connected");
        self.from_tcp(stream)
    }

    /// Wrap an already connected socket, e.g. one returned by `accept`.
    ///
    /// The socket is cloned into a read handle, a write handle and a
    /// shutdown handle; closing the connection shuts down all three.
    pub fn from_tcp(self, stream: TcpStream) -> Result<TcpConnection> {
        let peer = stream.peer_addr().ok();
        let input = stream.try_clone()?;
        let shutdown = Arc::new(stream.try_clone()?);
        let shared = self.shutdown_with(shutdown).into_shared();
        Ok(Connection::from_shared(input, stream, shared, peer))
    }
}

impl Connection<TcpStream, TcpStream> {
    /// Connect to `host:port` with default settings
    pub fn open(host: &str, port: u16) -> Result<Self> {
        ConnectionBuilder::default().open(host, port)
    }

    /// Wrap an accepted socket with default settings
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        ConnectionBuilder::default().from_tcp(stream)
    }
}
