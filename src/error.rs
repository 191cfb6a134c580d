//! # Error Types
//!
//! Error handling for the wire codec.
//!
//! Every connection operation returns [`Result`], so transport and framing
//! failures are always visible at the call site.
//!
//! ## Error Categories
//! - **Transport**: the underlying read/write/connect failed; fatal to the connection
//! - **Frame corruption**: the stream ended inside a declared frame, or a length field is invalid
//! - **Oversize writes**: a payload exceeds the write cap; raised before any byte is written
//! - **Codec**: a value codec rejected a value or could not decode a frame
//! - **Compression**: the block compressor failed in either direction
//!
//! ## Example Usage
//! ```rust
//! use wire_connection::error::{WireError, Result};
//! use tracing::{info, error};
//!
//! fn checked_len(len: usize) -> Result<i32> {
//!     i32::try_from(len).map_err(|_| WireError::OversizeWrite {
//!         len,
//!         limit: i32::MAX as usize,
//!     })
//! }
//!
//! match checked_len(42) {
//!     Ok(len) => info!(len, "length fits"),
//!     Err(e) => error!(error = %e, "length rejected"),
//! }
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_FIXED_WIDTH_MISMATCH: &str = "Encoded value does not match the fixed width";
    pub const ERR_INVALID_PRESENCE_BYTE: &str = "Invalid presence marker";
    pub const ERR_INVALID_UTF8: &str = "Payload is not valid UTF-8";
    pub const ERR_UNMAPPABLE_CHAR: &str = "Character cannot be encoded in the configured charset";
}

/// WireError is the error type for all connection operations
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Frame corrupted: expected {expected} bytes, received {received}")]
    FrameCorruption { expected: usize, received: usize },

    #[error("Invalid length field: {0}")]
    InvalidLength(i32),

    #[error("Payload of {len} bytes exceeds the write limit of {limit} bytes")]
    OversizeWrite { len: usize, limit: usize },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Compression failed")]
    CompressionFailure,

    #[error("Decompression failed")]
    DecompressionFailure,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl WireError {
    /// Whether the connection must be closed after this error.
    ///
    /// Oversize writes and codec failures leave the stream aligned on a frame
    /// boundary. Everything else either left part of a frame on the stream or
    /// means the peer disagrees about the wire format.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            WireError::OversizeWrite { .. }
                | WireError::Codec(_)
                | WireError::CompressionFailure
                | WireError::Config(_)
        )
    }
}

/// Type alias for Results using WireError
pub type Result<T> = std::result::Result<T, WireError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(WireError::ConnectionClosed.is_fatal());
        assert!(WireError::FrameCorruption {
            expected: 8,
            received: 3
        }
        .is_fatal());
        assert!(WireError::DecompressionFailure.is_fatal());
        assert!(!WireError::OversizeWrite { len: 10, limit: 5 }.is_fatal());
        assert!(!WireError::Codec("bad".into()).is_fatal());
    }

    #[test]
    fn test_display_includes_counts() {
        let err = WireError::FrameCorruption {
            expected: 100,
            received: 50,
        };
        assert_eq!(
            err.to_string(),
            "Frame corrupted: expected 100 bytes, received 50"
        );
    }
}
