//! Benchmarks for periodic Laguerre cell construction.
//!
//! Measures `cell_areas` and `mass_map_derivatives` over seed counts that
//! bracket typical solver workloads. Seeds are generated from a fixed seed
//! so runs are comparable.

#![allow(missing_docs)] // Criterion macros generate undocumented functions

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sdot::prelude::*;
use std::hint::black_box;

const BENCH_SEED: u64 = 0x5D07;

fn scattered_seeds(n: usize) -> Vec<Point2> {
    let mut rng = ChaCha8Rng::seed_from_u64(BENCH_SEED);
    (0..n)
        .map(|_| Point2::new(rng.random_range(0.0..1.0), rng.random_range(0.0..1.0)))
        .collect()
}

fn bench_cell_areas(c: &mut Criterion) {
    let domain = Domain::new(0.0, 0.0, 1.0, 1.0).unwrap();
    let diagram = LaguerreDiagram::default();
    let mut group = c.benchmark_group("cell_areas");
    for &n in &[100_usize, 500, 1000] {
        let seeds = scattered_seeds(n);
        let weights = vec![0.0; n];
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                black_box(diagram.cell_areas(
                    black_box(&domain),
                    black_box(&seeds),
                    black_box(&weights),
                    Periodicity::X,
                ))
            });
        });
    }
    group.finish();
}

fn bench_mass_map_derivatives(c: &mut Criterion) {
    let domain = Domain::new(0.0, 0.0, 1.0, 1.0).unwrap();
    let diagram = LaguerreDiagram::default();
    let mut group = c.benchmark_group("mass_map_derivatives");
    for &n in &[100_usize, 500] {
        let seeds = scattered_seeds(n);
        let weights = vec![0.0; n];
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                black_box(diagram.mass_map_derivatives(
                    black_box(&domain),
                    black_box(&seeds),
                    black_box(&weights),
                    Periodicity::X,
                ))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cell_areas, bench_mass_map_derivatives);
criterion_main!(benches);
