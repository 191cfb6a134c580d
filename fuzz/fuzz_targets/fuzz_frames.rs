#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use wire_connection::config::ConnectionConfig;
use wire_connection::{BigEndian, BytesCodec, ConnectionBuilder, SerdeCodec, StringCodec};

fuzz_target!(|data: &[u8]| {
    // Keep hostile length fields from allocating gigabytes
    let config = ConnectionConfig {
        max_decompressed_size: 16 * 1024 * 1024,
        ..ConnectionConfig::default()
    };
    if data.len() >= 4 {
        let claimed = i32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        if claimed.unsigned_abs() as usize > data.len() {
            return;
        }
    }

    let mut conn = ConnectionBuilder::new()
        .config(config)
        .adopt(Cursor::new(data), Vec::new());

    // One frame per input; any outcome is fine as long as it is not a panic
    let _ = match data.first().map(|b| b % 5) {
        Some(0) => conn.read_value(&BytesCodec).map(|_| ()),
        Some(1) => conn.read_value(&StringCodec).map(|_| ()),
        Some(2) => conn
            .read_value(&SerdeCodec::<Vec<(u32, String)>>::default())
            .map(|_| ()),
        Some(3) => conn.read_value(&BigEndian::<i64>::new()).map(|_| ()),
        _ => conn.read_string().map(|_| ()),
    };
});
