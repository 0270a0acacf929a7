//! Iteration benchmarks for multiarray
//!
//! Compares the linear fast path with the per-dimension odometer used by
//! strided views, and measures materializing a view into dense storage.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use multiarray::{Array, Section};
use std::hint::black_box;

fn cube(n: usize) -> Array {
    Array::from_vec(&[n, n, n], (0..n * n * n).map(|v| v as f64).collect()).unwrap()
}

fn bench_offsets(c: &mut Criterion) {
    let mut group = c.benchmark_group("offsets");

    for n in [16usize, 64] {
        let dense = cube(n);
        let transposed = dense.transpose(0, 2).unwrap();

        group.bench_with_input(BenchmarkId::new("fast", n), &dense, |b, a| {
            b.iter(|| black_box(a.index_calculator().offsets().sum::<usize>()));
        });

        group.bench_with_input(BenchmarkId::new("odometer", n), &transposed, |b, a| {
            b.iter(|| black_box(a.index_calculator().offsets().sum::<usize>()));
        });
    }

    group.finish();
}

fn bench_typed_iteration(c: &mut Criterion) {
    let mut group = c.benchmark_group("typed_iteration");
    let dense = cube(48);
    let flipped = dense.flip(1).unwrap();

    group.bench_function("get_f64_next_fast", |b| {
        b.iter(|| {
            let mut it = dense.index_iterator();
            let mut sum = 0.0;
            while it.has_next() {
                sum += it.get_f64_next().unwrap();
            }
            black_box(sum)
        });
    });

    group.bench_function("get_f64_next_flipped", |b| {
        b.iter(|| {
            let mut it = flipped.index_iterator();
            let mut sum = 0.0;
            while it.has_next() {
                sum += it.get_f64_next().unwrap();
            }
            black_box(sum)
        });
    });

    group.finish();
}

fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("materialize");
    let dense = cube(64);
    let section: Section = "0:63:2,:,8:40".parse().unwrap();
    let view = dense.section(&section).unwrap();

    group.bench_function("to_vec_dense", |b| {
        b.iter(|| black_box(dense.to_vec::<f64>().unwrap()));
    });

    group.bench_function("to_vec_section", |b| {
        b.iter(|| black_box(view.to_vec::<f64>().unwrap()));
    });

    group.bench_function("copy_section", |b| {
        b.iter(|| black_box(view.copy().unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_offsets, bench_typed_iteration, bench_materialize);
criterion_main!(benches);
