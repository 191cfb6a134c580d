//! Integration tests for split connections over real sockets
//!
//! One thread reads while another writes on the same connection, and a
//! close handle interrupts a blocked reader.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::TcpListener;
use std::thread;
use std::time::Duration;
use wire_connection::{Connection, SerdeCodec, WireError};

const ROUNDS: i64 = 2_000;

fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[test]
fn test_split_halves_on_separate_threads() {
    let (listener, port) = listener();

    // Echo server: every long comes back doubled
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut conn = Connection::from_tcp(stream).unwrap();
        for _ in 0..ROUNDS {
            let value = conn.read_long().unwrap();
            conn.write_long(value * 2).unwrap();
            conn.flush().unwrap();
        }
    });

    let client = Connection::open("127.0.0.1", port).unwrap();
    let (mut reader, mut writer) = client.split();

    let sender = thread::spawn(move || {
        for i in 0..ROUNDS {
            writer.write_long(i).unwrap();
        }
        writer.flush().unwrap();
        writer
    });

    let receiver = thread::spawn(move || {
        for i in 0..ROUNDS {
            assert_eq!(reader.read_long().unwrap(), i * 2);
        }
    });

    let _writer = sender.join().expect("Writer thread panicked");
    receiver.join().expect("Reader thread panicked");
    server.join().expect("Server thread panicked");
}

#[test]
fn test_request_response_with_objects() {
    let (listener, port) = listener();
    let codec = SerdeCodec::<Vec<String>>::default();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut conn = Connection::from_tcp(stream).unwrap();
        let prefix = conn.read_string().unwrap();
        let words: Vec<String> = ["bag", "of", "words", "bagel"]
            .iter()
            .filter(|w| w.starts_with(&prefix))
            .map(|w| w.to_string())
            .collect();
        conn.write_value(Some(&words), &codec).unwrap();
        conn.flush().unwrap();
    });

    let mut client = Connection::open("127.0.0.1", port).unwrap();
    client.write_string("bag").unwrap();
    client.flush().unwrap();
    assert_eq!(
        client.read_value(&codec).unwrap(),
        Some(vec!["bag".to_string(), "bagel".to_string()])
    );
    server.join().unwrap();
}

#[test]
fn test_close_handle_unblocks_reader() {
    let (listener, port) = listener();

    // Server accepts and stays silent until told to stop
    let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();
    let server = thread::spawn(move || {
        let (_stream, _) = listener.accept().unwrap();
        let _ = stop_rx.recv();
    });

    let client = Connection::open("127.0.0.1", port).unwrap();
    let handle = client.close_handle();
    let (mut reader, _writer) = client.split();

    let blocked = thread::spawn(move || reader.read_long());
    thread::sleep(Duration::from_millis(100));
    handle.close().unwrap();

    let result = blocked.join().expect("Reader thread panicked");
    assert!(matches!(result, Err(WireError::ConnectionClosed)));
    assert!(handle.is_closed());

    stop_tx.send(()).unwrap();
    server.join().unwrap();
}

#[test]
fn test_peer_sees_close_as_end_of_stream() {
    let (listener, port) = listener();

    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut conn = Connection::from_tcp(stream).unwrap();
        assert_eq!(conn.read_int().unwrap(), 11);
        conn.read_int()
    });

    let mut client = Connection::open("127.0.0.1", port).unwrap();
    client.write_int(11).unwrap();
    client.close().unwrap();

    let result = server.join().unwrap();
    assert!(matches!(
        result,
        Err(WireError::FrameCorruption {
            expected: 4,
            received: 0
        })
    ));
}
