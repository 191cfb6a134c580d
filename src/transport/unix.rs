//! Unix domain socket connections for peers on the same host.

use crate::connection::{Connection, ConnectionBuilder};
use crate::error::Result;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Blocking connection over a Unix domain socket
pub type UnixConnection = Connection<UnixStream, UnixStream>;

impl ConnectionBuilder {
    /// Connect to the socket at `path` and wrap it.
    #[instrument(skip(self, path), fields(socket_path = %path.as_ref().display()))]
    pub fn open_unix<P: AsRef<Path>>(self, path: P) -> Result<UnixConnection> {
        let stream = UnixStream::connect(path)?;
        info!("Connected to unix socket");
        self.from_unix(stream)
    }

    /// Wrap an already connected Unix socket
    pub fn from_unix(self, stream: UnixStream) -> Result<UnixConnection> {
        let input = stream.try_clone()?;
        let shutdown = Arc::new(stream.try_clone()?);
        let shared = self.shutdown_with(shutdown).into_shared();
        Ok(Connection::from_shared(input, stream, shared, None))
    }
}

impl Connection<UnixStream, UnixStream> {
    /// Wrap a connected Unix socket with default settings
    pub fn from_unix(stream: UnixStream) -> Result<Self> {
        ConnectionBuilder::default().from_unix(stream)
    }
}
