// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Custom callbacks: print matches as they are found, forward them into the
//! output buffer, and count raw hits without allocating a buffer at all.

use core::sync::atomic::{AtomicUsize, Ordering};

use treeline_bvh::{
    Aabb3, Bvh, Hit, OutputSink, Parallel, Point3, Predicate, QueryCallback, intersects, nearest,
    query, traverse,
};

/// Prints every match, then forwards it into the buffer.
struct PrintingCallback;

impl QueryCallback<Hit> for PrintingCallback {
    fn on_intersects(&self, _: &Predicate, primitive: u32, out: &mut OutputSink<'_, Hit>) {
        println!("found {primitive} from callback");
        out.push(Hit {
            primitive,
            distance: None,
        });
    }

    fn on_nearest(
        &self,
        _: &Predicate,
        primitive: u32,
        distance: f32,
        out: &mut OutputSink<'_, Hit>,
    ) {
        println!("found {primitive} with distance {distance:.3} from callback");
        out.push(Hit {
            primitive,
            distance: Some(distance),
        });
    }
}

fn main() {
    // 100 pseudo-random points in [-1, 1]^3 (xorshift, fixed seed).
    let mut state = 0x1234_5678_9abc_def0_u64;
    let mut rand = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0
    };
    let points: Vec<Point3> = (0..100)
        .map(|_| Point3::new(rand(), rand(), rand()))
        .collect();

    let bvh = Bvh::build(&Parallel, &points);

    // Every point in the first octant.
    let first_octant = vec![intersects(Aabb3::from_corners(
        0.0, 0.0, 0.0, 1.0, 1.0, 1.0,
    ))];
    let results = query(&Parallel, &bvh, &first_octant, &PrintingCallback);
    println!("first octant: {} points", results.segment(0).len());

    // The ten points nearest the origin.
    let nearest_to_origin = vec![nearest(Point3::ORIGIN, 10)];
    let results = query(&Parallel, &bvh, &nearest_to_origin, &PrintingCallback);
    for hit in results.segment(0) {
        println!(
            "nearest: {} at {:.3}",
            hit.primitive,
            hit.distance.unwrap_or(f32::NAN)
        );
    }

    // Raw traversal: count pairs without an output buffer.
    let counter = AtomicUsize::new(0);
    traverse(&Parallel, &bvh, &first_octant, |i, j| {
        let c = counter.fetch_add(1, Ordering::Relaxed) + 1;
        println!("{c} {i} {j}");
    });
}
