//! Block compression for large variable-width objects.
//!
//! The connection only compresses objects above its threshold and marks them
//! with a negative length, so the compressor is the one thing both peers
//! must configure identically.

use crate::error::{Result, WireError};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// A reversible byte-array compressor.
///
/// `decompress(compress(x)) == x` must hold for every input. `limit` bounds
/// the decompressed output; exceeding it is a `DecompressionFailure`.
pub trait BlockCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>>;
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    #[default]
    Lz4,
    Zstd,
}

impl BlockCompressor for CompressionKind {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        compress(data, self)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>> {
        decompress(data, self, limit)
    }
}

/// Compresses data using the specified compression algorithm
///
/// # Errors
/// Returns `WireError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], kind: &CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, 1)
                .map_err(|_| WireError::CompressionFailure)?;
            Ok(out)
        }
    }
}

/// Decompresses data that was compressed with the specified algorithm
///
/// The output may not exceed `limit` bytes; LZ4 input claiming a larger size
/// is rejected before any allocation.
///
/// # Errors
/// Returns `WireError::DecompressionFailure` if:
/// - Decompression fails
/// - Output size exceeds `limit`
pub fn decompress(data: &[u8], kind: &CompressionKind, limit: usize) -> Result<Vec<u8>> {
    match *kind {
        CompressionKind::Lz4 => {
            if data.len() < 4 {
                return Err(WireError::DecompressionFailure);
            }

            // lz4_flex prepends the uncompressed size as 4-byte little-endian
            let claimed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if claimed_size > limit {
                return Err(WireError::DecompressionFailure);
            }

            lz4_flex::decompress_size_prepended(data).map_err(|_| WireError::DecompressionFailure)
        }
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            let mut reader =
                zstd::stream::Decoder::new(data).map_err(|_| WireError::DecompressionFailure)?;

            // Read in chunks to enforce the size limit
            let mut buffer = [0u8; 8192];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        out.extend_from_slice(&buffer[..n]);
                        if out.len() > limit {
                            return Err(WireError::DecompressionFailure);
                        }
                    }
                    Err(_) => return Err(WireError::DecompressionFailure),
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 16 * 1024 * 1024;

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_lz4_compression_roundtrip() {
        let original = b"Hello, World! This is a test of LZ4 compression.";
        let compressed = compress(original, &CompressionKind::Lz4).unwrap();
        let decompressed = decompress(&compressed, &CompressionKind::Lz4, LIMIT).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_zstd_compression_roundtrip() {
        let original = b"Hello, World! This is a test of Zstd compression.";
        let compressed = compress(original, &CompressionKind::Zstd).unwrap();
        let decompressed = decompress(&compressed, &CompressionKind::Zstd, LIMIT).unwrap();
        assert_eq!(original.as_slice(), decompressed.as_slice());
    }

    #[test]
    fn test_lz4_claimed_size_over_limit() {
        // Claims to decompress to 3+ GB
        let malicious_payload = vec![0x2b, 0x60, 0xbb, 0xbb];
        let result = decompress(&malicious_payload, &CompressionKind::Lz4, LIMIT);
        assert!(result.is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_limit_is_per_call() {
        let data = vec![7u8; 4096];
        for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
            let compressed = compress(&data, &kind).unwrap();
            assert!(decompress(&compressed, &kind, 4095).is_err());
            assert_eq!(decompress(&compressed, &kind, 4096).unwrap(), data);
        }
    }

    #[test]
    fn test_lz4_short_input_rejection() {
        let short_input = vec![0x2b, 0x60];
        let result = decompress(&short_input, &CompressionKind::Lz4, LIMIT);
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_compressed_data() {
        let malformed = vec![0x10, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff];
        let result = decompress(&malformed, &CompressionKind::Lz4, LIMIT);
        assert!(result.is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_trait_object_dispatch() {
        let compressor: &dyn BlockCompressor = &CompressionKind::Zstd;
        let data = vec![1u8; 2048];
        let compressed = compressor.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(compressor.decompress(&compressed, LIMIT).unwrap(), data);
    }
}
