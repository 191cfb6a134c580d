//! # Core Wire Components
//!
//! Framing, value codecs and object encoding shared by the blocking and
//! async connections.
//!
//! ## Components
//! - **Frame**: length prefix interpretation and the compression rule
//! - **Value**: the [`ValueCodec`](value::ValueCodec) seam and stock codecs
//! - **Object**: encodes and decodes complete object frames
//! - **Codec**: Tokio codec for byte-array frames
//! - **Serialization**: serde formats behind [`SerdeCodec`](value::SerdeCodec)
//!
//! ## Limits
//! - Byte arrays longer than [`MAX_BLOCK_SIZE`](crate::config::MAX_BLOCK_SIZE) are never written
//! - Object payloads above the compression threshold travel compressed with a negative length
//! - Decompressed output is capped before allocation

pub mod codec;
pub mod frame;
pub mod object;
pub mod serialization;
pub mod value;
