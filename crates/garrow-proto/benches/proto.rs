//! Benchmarks for garrow handshake parsing and serialization.

use bytes::BytesMut;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use garrow_core::DEFAULT_MAX_DESTINATION_LEN;
use garrow_proto::{encode_handshake, normalize_destination, parse_handshake};

fn bench_parse_handshake(c: &mut Criterion) {
    let mut buf = BytesMut::new();
    encode_handshake(&mut buf, "www.example.com:443").unwrap();
    buf.extend_from_slice(b"GET / HTTP/1.1\r\nHost: www.example.com\r\n\r\n");
    let buf = buf.freeze();

    c.bench_function("parse_handshake", |b| {
        b.iter(|| parse_handshake(black_box(&buf), DEFAULT_MAX_DESTINATION_LEN))
    });
}

fn bench_encode_handshake(c: &mut Criterion) {
    let mut buf = BytesMut::with_capacity(128);
    c.bench_function("encode_handshake", |b| {
        b.iter(|| {
            buf.clear();
            encode_handshake(&mut buf, black_box("www.example.com")).unwrap();
        })
    });
}

fn bench_normalize_destination(c: &mut Criterion) {
    c.bench_function("normalize_destination_with_port", |b| {
        b.iter(|| normalize_destination(black_box("www.example.com:443")))
    });
    c.bench_function("normalize_destination_without_port", |b| {
        b.iter(|| normalize_destination(black_box("www.example.com")))
    });
}

criterion_group!(
    benches,
    bench_parse_handshake,
    bench_encode_handshake,
    bench_normalize_destination
);
criterion_main!(benches);
