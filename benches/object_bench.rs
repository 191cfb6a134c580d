#![allow(clippy::unwrap_used)]

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};
use wire_connection::{BytesCodec, Connection, SerdeCodec, SerializationFormat};

#[derive(Serialize, Deserialize)]
struct Posting {
    word: String,
    documents: Vec<u64>,
}

fn posting(count: usize) -> Posting {
    let mut rng = rand::rng();
    Posting {
        word: "benchmark".into(),
        documents: (0..count).map(|_| rng.random()).collect(),
    }
}

fn bench_serde_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("serde_objects");

    for format in [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ] {
        let codec = SerdeCodec::<Posting>::new(format);
        let value = posting(1_000);

        group.bench_function(format!("write_{}", format.name()), |b| {
            b.iter(|| {
                let mut conn = Connection::adopt(io::empty(), io::sink());
                conn.write_value(Some(&value), &codec).unwrap();
                conn.flush().unwrap();
            })
        });

        let mut out = Connection::adopt(io::empty(), Vec::new());
        out.write_value(Some(&value), &codec).unwrap();
        let encoded = out.into_parts().unwrap().1;
        group.bench_function(format!("read_{}", format.name()), |b| {
            b.iter(|| {
                let mut conn = Connection::adopt(Cursor::new(&encoded[..]), io::sink());
                let read: Option<Posting> = conn.read_value(&codec).unwrap();
                assert!(read.is_some());
            })
        });
    }

    group.finish();
}

fn bench_compressed_objects(c: &mut Criterion) {
    let mut group = c.benchmark_group("compressed_objects");

    // Straddle the 1 MiB threshold
    for &size in &[512 * 1024usize, 2 * 1024 * 1024] {
        let payload: Vec<u8> = b"posting list "
            .iter()
            .copied()
            .cycle()
            .take(size)
            .collect();
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("roundtrip_{size}b"), |b| {
            b.iter_batched(
                || payload.clone(),
                |p| {
                    let mut out = Connection::adopt(io::empty(), Vec::new());
                    out.write_value(Some(&p), &BytesCodec).unwrap();
                    let encoded = out.into_parts().unwrap().1;

                    let mut input = Connection::adopt(Cursor::new(encoded), io::sink());
                    input.read_value(&BytesCodec).unwrap()
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_serde_objects, bench_compressed_objects);
criterion_main!(benches);
