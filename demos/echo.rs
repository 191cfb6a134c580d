//! Demo: a request/response exchange over loopback TCP
//!
//! The server thread answers word lookups; the client sends a prefix and
//! reads back a serde object. Set `WIRE_DEBUG=1` to see every transmitted
//! value in the log, and `WIRE_SERIALIZATION=json` to change the object
//! format on both sides.
//!
//! Run with: `cargo run --example echo`

use serde::{Deserialize, Serialize};
use std::net::TcpListener;
use std::thread;
use wire_connection::config::WireConfig;
use wire_connection::core::serialization::MultiFormat;
use wire_connection::utils::logging::init_logging;
use wire_connection::{ConnectionBuilder, Result, SerdeCodec, SerializationFormat};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Matches {
    prefix: String,
    words: Vec<String>,
}

impl MultiFormat for Matches {}

const DICTIONARY: &[&str] = &["bag", "bagel", "baggage", "word", "words", "wordy"];

fn serve(listener: TcpListener, config: WireConfig, format: SerializationFormat) -> Result<()> {
    let (stream, _) = listener.accept()?;
    let mut conn = ConnectionBuilder::new()
        .config(config.connection)
        .from_tcp(stream)?;
    let codec = SerdeCodec::<Matches>::new(format);

    loop {
        let prefix = conn.read_string()?;
        if prefix.is_empty() {
            break;
        }
        let words = DICTIONARY
            .iter()
            .filter(|w| w.starts_with(prefix.as_str()))
            .map(|w| w.to_string())
            .collect();
        conn.write_value(Some(&Matches { prefix, words }), &codec)?;
        conn.flush()?;
    }
    conn.close()
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let config = WireConfig::from_env()?;
    config.validate_strict()?;
    init_logging(&config.logging)?;

    let format = match std::env::var("WIRE_SERIALIZATION").as_deref() {
        Ok("json") => SerializationFormat::Json,
        Ok("msgpack") => SerializationFormat::MessagePack,
        _ => SerializationFormat::Bincode,
    };

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let server_config = config.clone();
    let server = thread::spawn(move || serve(listener, server_config, format));

    let mut client = ConnectionBuilder::new()
        .config(config.connection)
        .open("127.0.0.1", port)?;
    let codec = SerdeCodec::<Matches>::new(format);

    for prefix in ["bag", "word", "xyz"] {
        client.write_string(prefix)?;
        client.flush()?;
        if let Some(matches) = client.read_value(&codec)? {
            let size = matches.serialize_format(format)?.len();
            println!("{prefix:>4} -> {:?} ({size} bytes as {})", matches.words, format.name());
        }
    }

    client.write_string("")?;
    client.flush()?;
    client.metrics().log_summary();
    client.close()?;

    server
        .join()
        .map_err(|_| "server thread panicked")??;
    Ok(())
}
