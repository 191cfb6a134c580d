//! Transport-independent halves of the object and block codecs.
//!
//! Both connection flavours build frames here and only differ in how they
//! move the bytes, so the fixed/variable dispatch, the compression decision
//! and the size caps exist exactly once.

use crate::config::Charset;
use crate::core::frame::{should_compress, LengthPrefix};
use crate::core::value::ValueCodec;
use crate::error::{constants, Result, WireError};
use crate::utils::compression::BlockCompressor;
use std::borrow::Cow;

/// An object ready to be written
#[derive(Debug)]
pub struct EncodedObject {
    /// Signed length field; `None` for fixed-width types
    pub length: Option<i32>,
    /// Bytes following the length field (compressed when `length < 0`)
    pub payload: Vec<u8>,
}

impl EncodedObject {
    pub fn is_compressed(&self) -> bool {
        matches!(self.length, Some(len) if len < 0)
    }

    /// Total bytes this frame occupies on the wire
    pub fn wire_len(&self) -> usize {
        let header = if self.length.is_some() { 4 } else { 0 };
        header + self.payload.len()
    }
}

/// Encode `value` with `codec` and pick its frame layout.
///
/// Fixed-width output must match the declared width exactly. Variable-width
/// output above `threshold` bytes is compressed, and refused when it exceeds
/// `limit`, the size a reader with the same config would decompress.
pub fn encode_object<T, C>(
    value: Option<&T>,
    codec: &C,
    compressor: &dyn BlockCompressor,
    threshold: usize,
    limit: usize,
) -> Result<EncodedObject>
where
    C: ValueCodec<T> + ?Sized,
{
    let bytes = codec.encode(value)?;
    match codec.width() {
        Some(width) => {
            if bytes.len() != width {
                return Err(WireError::Codec(format!(
                    "{}: expected {width}, got {}",
                    constants::ERR_FIXED_WIDTH_MISMATCH,
                    bytes.len()
                )));
            }
            Ok(EncodedObject {
                length: None,
                payload: bytes,
            })
        }
        None => {
            let (prefix, payload) = if should_compress(bytes.len(), threshold) {
                if bytes.len() > limit {
                    return Err(WireError::OversizeWrite {
                        len: bytes.len(),
                        limit,
                    });
                }
                let compressed = compressor.compress(&bytes)?;
                (LengthPrefix::Compressed(compressed.len()), compressed)
            } else {
                (LengthPrefix::Raw(bytes.len()), bytes)
            };
            Ok(EncodedObject {
                length: Some(prefix.to_wire()?),
                payload,
            })
        }
    }
}

/// Turn a fully read payload back into a value.
///
/// `prefix` is `None` for fixed-width frames.
pub fn decode_object<T, C>(
    payload: Vec<u8>,
    prefix: Option<LengthPrefix>,
    codec: &C,
    compressor: &dyn BlockCompressor,
    limit: usize,
) -> Result<Option<T>>
where
    C: ValueCodec<T> + ?Sized,
{
    let bytes = match prefix {
        Some(LengthPrefix::Compressed(_)) => compressor.decompress(&payload, limit)?,
        _ => payload,
    };
    codec.decode(&bytes)
}

/// Validate a byte-array write against the cap and produce its length field.
///
/// The cap is inclusive: exactly `limit` bytes may be written.
pub fn block_length(len: usize, limit: usize) -> Result<i32> {
    if len > limit {
        return Err(WireError::OversizeWrite { len, limit });
    }
    LengthPrefix::Raw(len).to_wire()
}

/// Encode a string in the connection charset
pub fn encode_text(text: &str, charset: Charset) -> Result<Cow<'_, [u8]>> {
    match charset {
        Charset::Utf8 => Ok(Cow::Borrowed(text.as_bytes())),
        Charset::Latin1 => text
            .chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .map_err(|_| WireError::Codec(constants::ERR_UNMAPPABLE_CHAR.to_string()))
            })
            .collect::<Result<Vec<u8>>>()
            .map(Cow::Owned),
    }
}

/// Decode a string frame in the connection charset
pub fn decode_text(bytes: Vec<u8>, charset: Charset) -> Result<String> {
    match charset {
        Charset::Utf8 => String::from_utf8(bytes)
            .map_err(|_| WireError::Codec(constants::ERR_INVALID_UTF8.to_string())),
        Charset::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::value::{BigEndian, BytesCodec};
    use crate::utils::compression::CompressionKind;

    const MIB: usize = 1024 * 1024;

    #[test]
    fn test_fixed_width_has_no_length() {
        let frame =
            encode_object(Some(&7i64), &BigEndian::<i64>::new(), &CompressionKind::Lz4, MIB, 2 * MIB)
                .unwrap();
        assert_eq!(frame.length, None);
        assert_eq!(frame.wire_len(), 8);
    }

    #[test]
    fn test_small_variable_object_is_raw() {
        let value = vec![3u8; 100];
        let frame = encode_object(Some(&value), &BytesCodec, &CompressionKind::Lz4, MIB, 2 * MIB).unwrap();
        // presence byte + payload
        assert_eq!(frame.length, Some(101));
        assert!(!frame.is_compressed());
    }

    #[test]
    fn test_large_variable_object_is_compressed() {
        let value = vec![3u8; MIB + 10];
        let frame =
            encode_object(Some(&value), &BytesCodec, &CompressionKind::Lz4, MIB, 2 * MIB).unwrap();
        assert!(frame.is_compressed());
        assert_eq!(frame.length, Some(-(frame.payload.len() as i32)));

        let decoded: Option<Vec<u8>> = decode_object(
            frame.payload,
            Some(LengthPrefix::Compressed(0)),
            &BytesCodec,
            &CompressionKind::Lz4,
            2 * MIB,
        )
        .unwrap();
        assert_eq!(decoded, Some(value));
    }

    struct LyingCodec;

    impl ValueCodec<u8> for LyingCodec {
        fn width(&self) -> Option<usize> {
            Some(2)
        }

        fn encode(&self, _value: Option<&u8>) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }

        fn decode(&self, _bytes: &[u8]) -> Result<Option<u8>> {
            Ok(None)
        }
    }

    #[test]
    fn test_fixed_width_mismatch_rejected() {
        let result = encode_object(Some(&1u8), &LyingCodec, &CompressionKind::Lz4, MIB, 2 * MIB);
        assert!(matches!(result, Err(WireError::Codec(_))));
    }

    #[test]
    fn test_object_past_decompression_limit_rejected() {
        let value = vec![3u8; 3 * MIB];
        let result = encode_object(Some(&value), &BytesCodec, &CompressionKind::Lz4, MIB, 2 * MIB);
        assert!(matches!(
            result,
            Err(WireError::OversizeWrite { len, limit }) if len == 3 * MIB + 1 && limit == 2 * MIB
        ));

        // Exactly at the limit still goes out
        let value = vec![3u8; 2 * MIB - 1];
        let frame =
            encode_object(Some(&value), &BytesCodec, &CompressionKind::Lz4, MIB, 2 * MIB).unwrap();
        assert!(frame.is_compressed());
    }

    #[test]
    fn test_block_cap_is_inclusive() {
        assert_eq!(block_length(10, 10).unwrap(), 10);
        assert!(matches!(
            block_length(11, 10),
            Err(WireError::OversizeWrite { len: 11, limit: 10 })
        ));
    }

    #[test]
    fn test_latin1_text() {
        let bytes = encode_text("café", Charset::Latin1).unwrap();
        assert_eq!(bytes.as_ref(), &[b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode_text(bytes.into_owned(), Charset::Latin1).unwrap(), "café");
        assert!(encode_text("€", Charset::Latin1).is_err());
    }

    #[test]
    fn test_utf8_text() {
        let bytes = encode_text("café", Charset::Utf8).unwrap();
        assert_eq!(bytes.len(), 5);
        assert!(decode_text(vec![0xC3, 0x28], Charset::Utf8).is_err());
    }
}
