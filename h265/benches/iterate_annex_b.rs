//! Benchmarks iteration over Annex B NALs.
//!
//! The input is synthesized: a parameter set group followed by slices of varying size, similar in
//! shape to what a low-latency encoder produces.

use criterion::{criterion_group, criterion_main, Criterion};

fn synthesize(units: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for i in 0..units {
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x01]);
        let header: [u8; 2] = match i % 30 {
            0 => [0x26, 0x01],
            _ => [0x02, 0x01],
        };
        buf.extend_from_slice(&header);
        buf.extend((0..(500 + (i * 37) % 4000)).map(|j| (j % 251) as u8 | 0x10));
    }
    buf
}

fn criterion_benchmark(c: &mut Criterion) {
    let buf = synthesize(10000);
    let mut g = c.benchmark_group("iterate_annex_b");
    g.throughput(criterion::Throughput::Bytes(buf.len() as u64));
    g.bench_function("iterate_annex_b", |b| {
        b.iter(|| {
            assert_eq!(h265::iterate_annex_b(&buf).count(), 10000);
        });
    });
    g.warm_up_time(std::time::Duration::from_secs(1));
    g.sampling_mode(criterion::SamplingMode::Flat);
    g.sample_size(10);
    g.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
