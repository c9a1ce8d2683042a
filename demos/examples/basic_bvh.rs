// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Basic usage of Treeline BVH: build, batch queries, read CSR segments.

use treeline_bvh::{Aabb3, Bvh, Point3, Sequential, intersects, nearest, query_default};

fn main() {
    let boxes = vec![
        Aabb3::from_corners(0.0, 0.0, 0.0, 1.0, 1.0, 1.0),
        Aabb3::from_corners(5.0, 0.0, 0.0, 6.0, 1.0, 1.0),
        Aabb3::from_corners(0.0, 5.0, 0.0, 1.0, 6.0, 1.0),
    ];
    let bvh = Bvh::build(&Sequential, &boxes);
    println!("{bvh:?}");

    let predicates = vec![
        intersects(Aabb3::from_corners(0.5, 0.5, 0.5, 5.5, 5.5, 5.5)),
        nearest(Point3::new(5.0, 5.0, 0.0), 2),
    ];
    let results = query_default(&Sequential, &bvh, &predicates);

    for q in 0..results.num_predicates() {
        println!("predicate {q}:");
        for hit in results.segment(q) {
            match hit.distance {
                Some(d) => println!("  primitive {} at distance {d:.3}", hit.primitive),
                None => println!("  primitive {}", hit.primitive),
            }
        }
    }
}
