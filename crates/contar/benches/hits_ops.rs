//! Hit Counter Benchmarks
//!
//! Benchmarks for counter increments, method-local flushing and
//! coverage file encoding.
//!
//! Run with: `cargo bench --bench hits_ops`

use contar::data::lock_class;
use contar::io::{decode, encode};
use contar::{HitId, HitsArray, LocalHits, ProjectData, CURRENT_PROTOCOL_VERSION};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_hits_increment(c: &mut Criterion) {
    let mut group = c.benchmark_group("hits_increment");

    for size in [16_u32, 256, 4096] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |bench, &n| {
            let hits = HitsArray::new(n as usize);
            bench.iter(|| {
                for id in 0..n {
                    hits.increment(black_box(HitId::new(id)));
                }
            });
        });
    }

    group.finish();
}

fn bench_local_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("local_flush");

    for len in [8_u32, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |bench, &n| {
            let hits = HitsArray::new(n as usize);
            bench.iter(|| {
                let mut local = LocalHits::new(0, n);
                for id in (0..n).step_by(3) {
                    let _ = local.increment(HitId::new(id));
                }
                local.flush_into(black_box(&hits));
            });
        });
    }

    group.finish();
}

fn sample_project(classes: usize, lines: u32) -> ProjectData {
    let project = ProjectData::new();
    for c in 0..classes {
        let handle = project.get_or_create_class_data(&format!("bench.C{c}"));
        let mut data = lock_class(&handle);
        for line in 1..=lines {
            let signature = format!("m{}()V", line % 7);
            let record = data.get_or_create_line(line, &signature);
            record.set_hits(line * 3);
        }
    }
    project
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for (classes, lines, name) in [(10, 50, "10x50"), (100, 200, "100x200")] {
        let project = sample_project(classes, lines);
        group.bench_function(BenchmarkId::new("encode", name), |bench| {
            bench.iter(|| black_box(encode(&project, CURRENT_PROTOCOL_VERSION)));
        });
        if let Ok(bytes) = encode(&project, CURRENT_PROTOCOL_VERSION) {
            group.bench_function(BenchmarkId::new("decode", name), |bench| {
                bench.iter(|| black_box(decode(black_box(&bytes))));
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_hits_increment, bench_local_flush, bench_encode);
criterion_main!(benches);
