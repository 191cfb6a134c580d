//! # Serialization Formats
//!
//! Serde-backed encodings used by [`SerdeCodec`](crate::core::value::SerdeCodec)
//! to turn application values into variable-width object payloads.
//!
//! ## Formats
//! - **Bincode**: binary, fastest, the default
//! - **JSON**: human-readable, handy while debugging a peer
//! - **MessagePack**: compact binary, interoperable with non-Rust peers
//!
//! The format is not announced on the wire. Both ends pick the same format
//! for a given type, exactly as they agree on which codec reads which frame.

use crate::error::{Result, WireError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

/// Serialize `value` in the given format
pub fn to_bytes<T: Serialize + ?Sized>(value: &T, format: SerializationFormat) -> Result<Vec<u8>> {
    match format {
        SerializationFormat::Bincode => {
            bincode::serialize(value).map_err(|e| WireError::Codec(e.to_string()))
        }
        SerializationFormat::Json => {
            serde_json::to_vec(value).map_err(|e| WireError::Codec(e.to_string()))
        }
        SerializationFormat::MessagePack => {
            rmp_serde::to_vec(value).map_err(|e| WireError::Codec(e.to_string()))
        }
    }
}

/// Deserialize a value previously written by [`to_bytes`] in the same format
pub fn from_bytes<T: DeserializeOwned>(data: &[u8], format: SerializationFormat) -> Result<T> {
    match format {
        SerializationFormat::Bincode => {
            bincode::deserialize(data).map_err(|e| WireError::Codec(e.to_string()))
        }
        SerializationFormat::Json => {
            serde_json::from_slice(data).map_err(|e| WireError::Codec(e.to_string()))
        }
        SerializationFormat::MessagePack => {
            rmp_serde::from_slice(data).map_err(|e| WireError::Codec(e.to_string()))
        }
    }
}

/// Convenience methods for types that travel in more than one format
pub trait MultiFormat: Serialize + DeserializeOwned + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        to_bytes(self, format)
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        from_bytes(data, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: u64,
        label: String,
        weights: Vec<f32>,
    }

    impl MultiFormat for Sample {}

    fn sample() -> Sample {
        Sample {
            id: 7,
            label: "seven".to_string(),
            weights: vec![0.5, 1.5],
        }
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SerializationFormat::Bincode.name(), "Bincode");
        assert_eq!(SerializationFormat::Json.name(), "JSON");
        assert_eq!(SerializationFormat::MessagePack.name(), "MessagePack");
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_every_format_roundtrips() {
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let bytes = sample().serialize_format(format).expect("serialize");
            let recovered = Sample::deserialize_format(&bytes, format).expect("deserialize");
            assert_eq!(recovered, sample(), "{}", format.name());
        }
    }

    #[test]
    fn test_garbage_is_codec_error() {
        let result: Result<Sample> = from_bytes(&[0xFF, 0x00], SerializationFormat::Json);
        assert!(matches!(result, Err(WireError::Codec(_))));
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_sizes() {
        let msgpack_size = to_bytes(&sample(), SerializationFormat::MessagePack)
            .expect("msgpack")
            .len();
        let json_size = to_bytes(&sample(), SerializationFormat::Json)
            .expect("json")
            .len();

        // MessagePack should be more compact than JSON
        assert!(msgpack_size < json_size);
    }
}
