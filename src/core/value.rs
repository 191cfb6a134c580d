//! Value codecs: the width resolver and encoder a connection consults for
//! `write_value` / `read_value`.
//!
//! A codec stands for one logical type. Its [`width`](ValueCodec::width) is
//! fixed for the type, never per value, and both peers must use codecs that
//! agree on it. Absent values (`None`) go through the same codec, which
//! picks its own sentinel encoding for "no value".

use crate::core::serialization::{from_bytes, to_bytes, SerializationFormat};
use crate::error::{constants, Result, WireError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

const ABSENT: u8 = 0;
const PRESENT: u8 = 1;

/// Encoder, decoder, and width resolver for one logical type
pub trait ValueCodec<T> {
    /// `Some(w)` for types that always encode to exactly `w` bytes,
    /// `None` for variable-width types that need a length prefix.
    fn width(&self) -> Option<usize>;

    fn encode(&self, value: Option<&T>) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Option<T>>;
}

/// Numeric types with a fixed big-endian encoding and a reserved
/// "absent" value.
pub trait FixedWire: Sized + Copy {
    const WIDTH: usize;

    /// Value written in place of `None`. Sending it as `Some` reads back as
    /// `None`.
    const ABSENT: Self;

    fn put_be(self, out: &mut Vec<u8>);

    /// `bytes` is exactly `WIDTH` long
    fn get_be(bytes: &[u8]) -> Self;

    fn is_absent(&self) -> bool;
}

macro_rules! fixed_int {
    ($($t:ty),*) => {$(
        impl FixedWire for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();
            const ABSENT: Self = <$t>::MAX;

            fn put_be(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn get_be(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_be_bytes(buf)
            }

            fn is_absent(&self) -> bool {
                *self == Self::ABSENT
            }
        }
    )*};
}

macro_rules! fixed_float {
    ($($t:ty),*) => {$(
        impl FixedWire for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();
            const ABSENT: Self = <$t>::NAN;

            fn put_be(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_be_bytes());
            }

            fn get_be(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_be_bytes(buf)
            }

            fn is_absent(&self) -> bool {
                self.is_nan()
            }
        }
    )*};
}

fixed_int!(i64, i32, i16, u8);
fixed_float!(f64, f32);

/// Fixed-width codec for numeric types, big-endian on the wire.
///
/// `None` is sent as `MAX` for integers and NaN for floats.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigEndian<T>(PhantomData<T>);

impl<T> BigEndian<T> {
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T: FixedWire> ValueCodec<T> for BigEndian<T> {
    fn width(&self) -> Option<usize> {
        Some(T::WIDTH)
    }

    fn encode(&self, value: Option<&T>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(T::WIDTH);
        value.copied().unwrap_or(T::ABSENT).put_be(&mut out);
        Ok(out)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<T>> {
        if bytes.len() != T::WIDTH {
            return Err(WireError::Codec(
                constants::ERR_FIXED_WIDTH_MISMATCH.to_string(),
            ));
        }
        let value = T::get_be(bytes);
        Ok((!value.is_absent()).then_some(value))
    }
}

/// One-byte codec for booleans: 0 false, 1 true, 2 absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl ValueCodec<bool> for BoolCodec {
    fn width(&self) -> Option<usize> {
        Some(1)
    }

    fn encode(&self, value: Option<&bool>) -> Result<Vec<u8>> {
        Ok(vec![match value {
            Some(false) => 0,
            Some(true) => 1,
            None => 2,
        }])
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<bool>> {
        match bytes {
            [2] => Ok(None),
            [b] => Ok(Some(*b != 0)),
            _ => Err(WireError::Codec(
                constants::ERR_FIXED_WIDTH_MISMATCH.to_string(),
            )),
        }
    }
}

fn split_presence(bytes: &[u8]) -> Result<Option<&[u8]>> {
    match bytes.split_first() {
        Some((&PRESENT, rest)) => Ok(Some(rest)),
        Some((&ABSENT, [])) => Ok(None),
        _ => Err(WireError::Codec(
            constants::ERR_INVALID_PRESENCE_BYTE.to_string(),
        )),
    }
}

fn with_presence(payload: Option<&[u8]>) -> Vec<u8> {
    match payload {
        Some(bytes) => {
            let mut out = Vec::with_capacity(bytes.len() + 1);
            out.push(PRESENT);
            out.extend_from_slice(bytes);
            out
        }
        None => vec![ABSENT],
    }
}

/// Variable-width codec for any serde type.
///
/// Payload layout: one presence byte (0 absent, 1 present) followed by the
/// value in the chosen [`SerializationFormat`].
#[derive(Debug)]
pub struct SerdeCodec<T> {
    format: SerializationFormat,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    pub const fn new(format: SerializationFormat) -> Self {
        Self {
            format,
            _marker: PhantomData,
        }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }
}

impl<T> Clone for SerdeCodec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SerdeCodec<T> {}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new(SerializationFormat::Bincode)
    }
}

impl<T: Serialize + DeserializeOwned> ValueCodec<T> for SerdeCodec<T> {
    fn width(&self) -> Option<usize> {
        None
    }

    fn encode(&self, value: Option<&T>) -> Result<Vec<u8>> {
        match value {
            Some(v) => {
                let mut out = vec![PRESENT];
                out.extend(to_bytes(v, self.format)?);
                Ok(out)
            }
            None => Ok(vec![ABSENT]),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<T>> {
        split_presence(bytes)?
            .map(|payload| from_bytes(payload, self.format))
            .transpose()
    }
}

/// Variable-width codec for raw byte vectors with a presence byte
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl ValueCodec<Vec<u8>> for BytesCodec {
    fn width(&self) -> Option<usize> {
        None
    }

    fn encode(&self, value: Option<&Vec<u8>>) -> Result<Vec<u8>> {
        Ok(with_presence(value.map(Vec::as_slice)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(split_presence(bytes)?.map(<[u8]>::to_vec))
    }
}

/// Variable-width codec for UTF-8 strings with a presence byte
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ValueCodec<String> for StringCodec {
    fn width(&self) -> Option<usize> {
        None
    }

    fn encode(&self, value: Option<&String>) -> Result<Vec<u8>> {
        Ok(with_presence(value.map(String::as_bytes)))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<String>> {
        split_presence(bytes)?
            .map(|payload| {
                String::from_utf8(payload.to_vec())
                    .map_err(|_| WireError::Codec(constants::ERR_INVALID_UTF8.to_string()))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_big_endian_layout() {
        let codec = BigEndian::<i32>::new();
        assert_eq!(codec.width(), Some(4));
        assert_eq!(codec.encode(Some(&1)).unwrap(), vec![0, 0, 0, 1]);
        assert_eq!(codec.encode(Some(&-1)).unwrap(), vec![0xFF; 4]);
        assert_eq!(codec.decode(&[0, 0, 1, 0]).unwrap(), Some(256));
    }

    #[test]
    fn test_big_endian_absent_sentinel() {
        let longs = BigEndian::<i64>::new();
        let encoded = longs.encode(None).unwrap();
        assert_eq!(encoded.len(), 8);
        assert_eq!(longs.decode(&encoded).unwrap(), None);

        let doubles = BigEndian::<f64>::new();
        let encoded = doubles.encode(None).unwrap();
        assert_eq!(doubles.decode(&encoded).unwrap(), None);
        assert_eq!(
            doubles.decode(&doubles.encode(Some(&-0.25)).unwrap()).unwrap(),
            Some(-0.25)
        );
    }

    #[test]
    fn test_big_endian_rejects_wrong_width() {
        let codec = BigEndian::<i64>::new();
        assert!(matches!(codec.decode(&[1, 2, 3]), Err(WireError::Codec(_))));
    }

    #[test]
    fn test_bool_codec() {
        for value in [Some(true), Some(false), None] {
            let bytes = BoolCodec.encode(value.as_ref()).unwrap();
            assert_eq!(bytes.len(), 1);
            assert_eq!(BoolCodec.decode(&bytes).unwrap(), value);
        }
        assert_eq!(BoolCodec.decode(&[9]).unwrap(), Some(true));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_serde_codec_presence() {
        let codec = SerdeCodec::<Point>::default();
        assert_eq!(codec.width(), None);

        let bytes = codec.encode(Some(&Point { x: 1, y: 2 })).unwrap();
        assert_eq!(bytes[0], PRESENT);
        assert_eq!(codec.decode(&bytes).unwrap(), Some(Point { x: 1, y: 2 }));

        let absent = codec.encode(None).unwrap();
        assert_eq!(absent, vec![ABSENT]);
        assert_eq!(codec.decode(&absent).unwrap(), None);
    }

    #[test]
    fn test_presence_byte_validated() {
        assert!(BytesCodec.decode(&[]).is_err());
        assert!(BytesCodec.decode(&[7, 1]).is_err());
        assert!(BytesCodec.decode(&[ABSENT, 1]).is_err());
        assert_eq!(BytesCodec.decode(&[PRESENT]).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_string_codec_rejects_bad_utf8() {
        assert!(StringCodec.decode(&[PRESENT, 0xC3, 0x28]).is_err());
        let bytes = StringCodec.encode(Some(&"héllo".to_string())).unwrap();
        assert_eq!(StringCodec.decode(&bytes).unwrap().as_deref(), Some("héllo"));
    }
}
