//! Micro benchmarks for the classifier's hot path: signature scanning and
//! Shannon entropy. Pure CPU - no network, no IO.
//!
//! ```bash
//! cargo bench --bench bench_detectors
//! ```

use criterion::{criterion_group, criterion_main, Criterion};
use flowguard_core::analyzer::{analyze, AnalyzerThresholds};
use flowguard_core::entropy::shannon_entropy;

fn bt_handshake_payload() -> Vec<u8> {
    let mut payload = vec![19];
    payload.extend_from_slice(b"BitTorrent protocol");
    payload.extend_from_slice(&[0u8; 8]);
    payload.extend_from_slice(&[0u8; 20]);
    payload.extend_from_slice(b"-UT3500-123456789012");
    payload
}

fn random_like_payload(len: usize) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        })
        .collect()
}

fn bench_analyze_bt_handshake(c: &mut Criterion) {
    let payload = bt_handshake_payload();
    let thresholds = AnalyzerThresholds::default();
    let dst = (std::net::Ipv4Addr::new(10, 0, 0, 1), 6881);

    c.bench_function("analyze_bt_handshake", |b| {
        b.iter(|| analyze(std::hint::black_box(&payload), false, thresholds, dst.0, dst.1));
    });
}

fn bench_analyze_allowed_http(c: &mut Criterion) {
    let payload = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n".to_vec();
    let thresholds = AnalyzerThresholds::default();
    let dst = (std::net::Ipv4Addr::new(10, 0, 0, 1), 80);

    c.bench_function("analyze_allowed_http", |b| {
        b.iter(|| analyze(std::hint::black_box(&payload), false, thresholds, dst.0, dst.1));
    });
}

fn bench_shannon_entropy(c: &mut Criterion) {
    let payload = random_like_payload(1500);

    c.bench_function("shannon_entropy_1500_bytes", |b| {
        b.iter(|| shannon_entropy(std::hint::black_box(&payload)));
    });
}

criterion_group!(
    detector_benches,
    bench_analyze_bt_handshake,
    bench_analyze_allowed_http,
    bench_shannon_entropy
);
criterion_main!(detector_benches);
