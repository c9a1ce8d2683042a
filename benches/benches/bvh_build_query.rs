// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use treeline_bvh::{
    Aabb3, Bvh, Parallel, Point3, Predicate, Sequential, intersects, nearest, query_default,
};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f32(&mut self, lo: f32, hi: f32) -> f32 {
        let v = (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32;
        lo + v * (hi - lo)
    }
}

fn gen_random_cubes(count: usize, world: f32, side: f32, seed: u64) -> Vec<Aabb3> {
    let mut rng = Rng::new(seed);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let x = rng.next_f32(0.0, world);
        let y = rng.next_f32(0.0, world);
        let z = rng.next_f32(0.0, world);
        out.push(Aabb3::from_corners(x, y, z, x + side, y + side, z + side));
    }
    out
}

fn gen_intersect_predicates(count: usize, world: f32, extent: f32, seed: u64) -> Vec<Predicate> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            let x = rng.next_f32(0.0, world - extent);
            let y = rng.next_f32(0.0, world - extent);
            let z = rng.next_f32(0.0, world - extent);
            intersects(Aabb3::from_corners(
                x,
                y,
                z,
                x + extent,
                y + extent,
                z + extent,
            ))
        })
        .collect()
}

fn gen_nearest_predicates(count: usize, world: f32, k: usize, seed: u64) -> Vec<Predicate> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            nearest(
                Point3::new(
                    rng.next_f32(0.0, world),
                    rng.next_f32(0.0, world),
                    rng.next_f32(0.0, world),
                ),
                k,
            )
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    for &n in &[1_000_usize, 10_000, 100_000] {
        let cubes = gen_random_cubes(n, 1000.0, 2.0, 0xCAFE_F00D);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("sequential/{n}"), |b| {
            b.iter_batched(
                || cubes.clone(),
                |cubes| black_box(Bvh::build(&Sequential, &cubes)),
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("parallel/{n}"), |b| {
            b.iter_batched(
                || cubes.clone(),
                |cubes| black_box(Bvh::build(&Parallel, &cubes)),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_intersect_batch(c: &mut Criterion) {
    let cubes = gen_random_cubes(50_000, 1000.0, 2.0, 0xDEAD_BEEF);
    let bvh = Bvh::build(&Parallel, &cubes);
    let preds = gen_intersect_predicates(1_000, 1000.0, 10.0, 0x1234_5678);

    let mut group = c.benchmark_group("intersect_batch");
    group.throughput(Throughput::Elements(preds.len() as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| black_box(query_default(&Sequential, &bvh, &preds)));
    });
    group.bench_function("parallel", |b| {
        b.iter(|| black_box(query_default(&Parallel, &bvh, &preds)));
    });
    group.finish();
}

fn bench_nearest_batch(c: &mut Criterion) {
    let cubes = gen_random_cubes(50_000, 1000.0, 2.0, 0xBADC_0FFE);
    let bvh = Bvh::build(&Parallel, &cubes);
    let preds = gen_nearest_predicates(1_000, 1000.0, 10, 0x9E37_79B9);

    let mut group = c.benchmark_group("nearest_batch");
    group.throughput(Throughput::Elements(preds.len() as u64));
    group.bench_function("sequential", |b| {
        b.iter(|| black_box(query_default(&Sequential, &bvh, &preds)));
    });
    group.bench_function("parallel", |b| {
        b.iter(|| black_box(query_default(&Parallel, &bvh, &preds)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_build,
    bench_intersect_batch,
    bench_nearest_batch
);
criterion_main!(benches);
