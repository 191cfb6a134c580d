#![no_main]

use libfuzzer_sys::fuzz_target;
use wire_connection::utils::compression::{compress, decompress, CompressionKind};

const LIMIT: usize = 16 * 1024 * 1024;

fuzz_target!(|data: &[u8]| {
    for kind in [CompressionKind::Lz4, CompressionKind::Zstd] {
        if let Ok(compressed) = compress(data, &kind) {
            let restored = decompress(&compressed, &kind, LIMIT).expect("roundtrip must succeed");
            assert_eq!(restored, data);
        }

        // Malformed input must fail cleanly within the limit
        if let Ok(out) = decompress(data, &kind, LIMIT) {
            assert!(out.len() <= LIMIT);
        }
    }
});
