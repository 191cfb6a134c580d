//! # Wire Connection
//!
//! A point-to-point binary codec over any duplex byte stream: TCP sockets,
//! Unix sockets, in-memory pipes or anything implementing `Read`/`Write`
//! (or Tokio's `AsyncRead`/`AsyncWrite`).
//!
//! Both peers agree on the sequence of operations out of band. The wire
//! carries no type tags, only values:
//!
//! - Primitives in big-endian order
//! - Objects through a caller-supplied [`ValueCodec`], either fixed width or
//!   length-prefixed, with large payloads compressed transparently
//! - Byte arrays and strings with an `i32` length prefix
//!
//! ## Quick Start
//! ```rust,no_run
//! use wire_connection::{Connection, SerdeCodec, Result};
//!
//! fn ask(host: &str, port: u16) -> Result<Option<Vec<String>>> {
//!     let mut conn = Connection::open(host, port)?;
//!     conn.write_string("list")?;
//!     conn.write_long(42)?;
//!     conn.flush()?;
//!     conn.read_value(&SerdeCodec::<Vec<String>>::default())
//! }
//! ```
//!
//! ## Modules
//! - [`connection`]: blocking connection and its split halves
//! - [`async_connection`]: Tokio connection with the same wire format
//! - [`core`]: framing, value codecs, object encoding
//! - [`transport`]: TCP and Unix socket constructors, close handles
//! - [`config`]: configuration loading and validation
//! - [`utils`]: compression, tracing, metrics, logging setup

pub mod async_connection;
pub mod config;
pub mod connection;
pub mod core;
pub mod error;
pub mod transport;
pub mod utils;

pub use async_connection::{AsyncConnection, AsyncTcpConnection, AsyncWireReader, AsyncWireWriter};
pub use config::{Charset, ConnectionConfig, WireConfig};
pub use connection::{Connection, ConnectionBuilder, WireReader, WireWriter};
pub use core::codec::BlockCodec;
pub use core::serialization::SerializationFormat;
pub use core::value::{BigEndian, BoolCodec, BytesCodec, SerdeCodec, StringCodec, ValueCodec};
pub use error::{Result, WireError};
pub use transport::tcp::TcpConnection;
pub use transport::CloseHandle;
#[cfg(unix)]
pub use transport::unix::UnixConnection;
pub use utils::compression::{BlockCompressor, CompressionKind};
pub use utils::trace::{TraceSink, TracingSink};
