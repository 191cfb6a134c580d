//! Tokio codec for byte-array frames.
//!
//! Frames are `[i32 len][len bytes]`, the same layout as
//! [`write_byte_array`](crate::connection::WireWriter::write_byte_array),
//! so a `Framed` stream interoperates with a [`Connection`](crate::Connection)
//! that only exchanges byte arrays.

use crate::config::{MAX_BLOCK_SIZE, SUSPICIOUS_BLOCK_LENGTH};
use crate::core::frame::{LengthPrefix, LENGTH_FIELD_SIZE};
use crate::core::object::block_length;
use crate::error::WireError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
    max_block_size: usize,
}

impl BlockCodec {
    pub fn new(max_block_size: usize) -> Self {
        Self { max_block_size }
    }
}

impl Default for BlockCodec {
    fn default() -> Self {
        Self::new(MAX_BLOCK_SIZE)
    }
}

impl Decoder for BlockCodec {
    type Item = Bytes;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        let raw = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        let len = LengthPrefix::block_from_wire(raw)?;
        if len > self.max_block_size {
            return Err(WireError::InvalidLength(raw));
        }

        let total = LENGTH_FIELD_SIZE + len;
        if src.len() < total {
            // Only the first partial decode of a frame has to grow the buffer
            if src.capacity() < total {
                if len > SUSPICIOUS_BLOCK_LENGTH {
                    warn!(len, "Waiting for a very large frame");
                }
                src.reserve(total - src.len());
            }
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl<T: AsRef<[u8]>> Encoder<T> for BlockCodec {
    type Error = WireError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = item.as_ref();
        let length = block_length(bytes.len(), self.max_block_size)?;
        dst.reserve(LENGTH_FIELD_SIZE + bytes.len());
        dst.put_i32(length);
        dst.put_slice(bytes);
        Ok(())
    }
}
