// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched query driver: one traversal per predicate, dispatched in
//! parallel, aggregated into one CSR output buffer.

use core::sync::atomic::AtomicUsize;
use std::sync::OnceLock;

use crate::access::Predicates;
use crate::executor::Executor;
use crate::output::{OutputSink, QueryResults, exclusive_prefix_sum, into_values};
use crate::predicate::Predicate;
use crate::traversal::{for_each_intersecting, for_each_nearest};
use crate::tree::Bvh;

/// Per-match callback for batched queries.
///
/// `on_intersects` fires for matches of intersection predicates,
/// `on_nearest` (with the point-to-box distance) for nearest predicates.
/// A callback may perform side effects and decides whether to forward the
/// match into the buffer by pushing into the sink.
///
/// The driver runs every predicate twice (count pass, then fill pass), so
/// a callback is invoked twice per match and must push the same values
/// both times. Side effects should be idempotent or cheap.
pub trait QueryCallback<V>: Sync {
    /// A primitive matched an intersection predicate.
    fn on_intersects(&self, predicate: &Predicate, primitive: u32, out: &mut OutputSink<'_, V>);

    /// A primitive matched a nearest predicate at the given distance.
    fn on_nearest(
        &self,
        predicate: &Predicate,
        primitive: u32,
        distance: f32,
        out: &mut OutputSink<'_, V>,
    );
}

/// A single match produced by the default callback.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hit {
    /// Index of the matched primitive in the caller's collection.
    pub primitive: u32,
    /// Distance to the query point; `None` for intersection matches.
    pub distance: Option<f32>,
}

/// The built-in callback: forward every match into the buffer unchanged.
#[derive(Copy, Clone, Debug, Default)]
pub struct ForwardAll;

impl QueryCallback<Hit> for ForwardAll {
    fn on_intersects(&self, _: &Predicate, primitive: u32, out: &mut OutputSink<'_, Hit>) {
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
        out.push(Hit {
            primitive,
            distance: Some(distance),
        });
    }
}

/// Run one predicate against the tree, reporting matches to the callback.
/// Invalid predicates are absorbed here: their segment stays empty and the
/// rest of the batch is unaffected.
fn run_one<C, V>(bvh: &Bvh, predicate: &Predicate, callback: &C, sink: &mut OutputSink<'_, V>)
where
    C: QueryCallback<V>,
{
    if !predicate.is_valid() {
        return;
    }
    match *predicate {
        Predicate::Intersects(bounds) => {
            for_each_intersecting(bvh, &bounds, |primitive| {
                callback.on_intersects(predicate, primitive, sink);
            });
        }
        Predicate::Nearest(point, k) => {
            for_each_nearest(bvh, point, k, |primitive, distance| {
                callback.on_nearest(predicate, primitive, distance, sink);
            });
        }
    }
}

/// Execute every predicate in the collection against the tree, in parallel
/// across predicates, routing matches through `callback`.
///
/// Returns the CSR buffer of everything the callback forwarded. Segment
/// order follows predicate order; match order within a segment is
/// traversal order.
pub fn query<E, P, C, V>(executor: &E, bvh: &Bvh, predicates: &P, callback: &C) -> QueryResults<V>
where
    E: Executor,
    P: Predicates + ?Sized,
    C: QueryCallback<V>,
    V: Send + Sync,
{
    let m = predicates.len();

    // Pass 1: per-predicate match counts.
    let counts: Vec<usize> = executor.map(m, |i| {
        let mut count = 0;
        let mut sink = OutputSink::counting(&mut count);
        run_one(bvh, &predicates.get(i), callback, &mut sink);
        count
    });
    let offsets = exclusive_prefix_sum(&counts);
    let total = offsets[m];

    // Pass 2: re-run each predicate, writing into its reserved segment
    // through an atomic cursor that starts at the segment's offset.
    let slots: Vec<OnceLock<V>> = (0..total).map(|_| OnceLock::new()).collect();
    let cursors: Vec<AtomicUsize> = offsets[..m].iter().map(|&o| AtomicUsize::new(o)).collect();
    executor.for_each(m, |i| {
        let mut sink = OutputSink::filling(&slots, &cursors[i]);
        run_one(bvh, &predicates.get(i), callback, &mut sink);
    });

    QueryResults {
        values: into_values(slots),
        offsets,
    }
}

/// [`query`] with the built-in callback that forwards every match.
pub fn query_default<E, P>(executor: &E, bvh: &Bvh, predicates: &P) -> QueryResults<Hit>
where
    E: Executor,
    P: Predicates + ?Sized,
{
    query(executor, bvh, predicates, &ForwardAll)
}

/// Raw pairwise traversal: invoke `visitor(predicate_index, primitive_index)`
/// for every hit, bypassing the output buffer entirely.
///
/// Intended for custom aggregation (counting, histograms) where allocating
/// a result buffer would be wasted work. Runs a single pass.
pub fn traverse<E, P, F>(executor: &E, bvh: &Bvh, predicates: &P, visitor: F)
where
    E: Executor,
    P: Predicates + ?Sized,
    F: Fn(usize, u32) + Sync + Send,
{
    executor.for_each(predicates.len(), |i| {
        let predicate = predicates.get(i);
        if !predicate.is_valid() {
            return;
        }
        match predicate {
            Predicate::Intersects(bounds) => {
                for_each_intersecting(bvh, &bounds, |primitive| visitor(i, primitive));
            }
            Predicate::Nearest(point, k) => {
                for_each_nearest(bvh, point, k, |primitive, _| visitor(i, primitive));
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{Parallel, Sequential};
    use crate::predicate::{intersects, nearest};
    use crate::types::{Aabb3, Point3};
    use core::sync::atomic::Ordering;

    fn cube(x: f32, y: f32, z: f32, side: f32) -> Aabb3 {
        Aabb3::from_corners(x, y, z, x + side, y + side, z + side)
    }

    // Deterministic xorshift; keeps tests reproducible without an RNG dep.
    struct Rng(u64);

    impl Rng {
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

    fn random_points(count: usize, seed: u64) -> Vec<Point3> {
        let mut rng = Rng(seed);
        (0..count)
            .map(|_| {
                Point3::new(
                    rng.next_f32(-1.0, 1.0),
                    rng.next_f32(-1.0, 1.0),
                    rng.next_f32(-1.0, 1.0),
                )
            })
            .collect()
    }

    fn check_offsets_law<V>(results: &QueryResults<V>, m: usize) {
        assert_eq!(results.offsets.len(), m + 1);
        assert_eq!(results.offsets[0], 0);
        assert_eq!(results.offsets[m], results.values.len());
        assert!(
            results.offsets.windows(2).all(|w| w[0] <= w[1]),
            "offsets must be non-decreasing"
        );
    }

    #[test]
    fn unit_cube_scenario() {
        // 1 primitive at the origin unit cube, 1 predicate for the same box.
        let boxes = vec![cube(0.0, 0.0, 0.0, 1.0)];
        let bvh = Bvh::build(&Sequential, &boxes);
        let preds = vec![intersects(cube(0.0, 0.0, 0.0, 1.0))];
        let results = query_default(&Sequential, &bvh, &preds);
        check_offsets_law(&results, 1);
        assert_eq!(results.values.len(), 1);
        assert_eq!(results.values[0].primitive, 0);
        assert_eq!(results.values[0].distance, None);
    }

    #[test]
    fn empty_primitive_set_yields_offsets_zero_zero() {
        let bvh = Bvh::build(&Sequential, &Vec::<Aabb3>::new());
        let preds = vec![intersects(cube(0.0, 0.0, 0.0, 1.0))];
        let results = query_default(&Sequential, &bvh, &preds);
        assert_eq!(results.offsets, vec![0, 0]);
        assert!(results.is_empty());
    }

    #[test]
    fn batch_matches_brute_force_intersection() {
        let points = random_points(100, 0xACE1);
        let bvh = Bvh::build(&Parallel, &points);
        let mut rng = Rng(0xD1CE);
        let preds: Vec<Predicate> = (0..25)
            .map(|_| {
                let x = rng.next_f32(-1.0, 0.5);
                let y = rng.next_f32(-1.0, 0.5);
                let z = rng.next_f32(-1.0, 0.5);
                intersects(cube(x, y, z, rng.next_f32(0.1, 1.0)))
            })
            .collect();
        let results = query_default(&Parallel, &bvh, &preds);
        check_offsets_law(&results, preds.len());

        for (q, pred) in preds.iter().enumerate() {
            let Predicate::Intersects(b) = pred else {
                unreachable!()
            };
            let mut got: Vec<u32> = results.segment(q).iter().map(|h| h.primitive).collect();
            got.sort_unstable();
            let expected: Vec<u32> = points
                .iter()
                .enumerate()
                .filter(|(_, p)| b.contains_point(**p))
                .map(|(i, _)| i as u32)
                .collect();
            assert_eq!(got, expected, "segment {q} must equal brute force");
        }
    }

    #[test]
    fn hundred_points_knn_from_origin() {
        // 100 random points in [-1, 1]^3, k = 10 at the origin, checked
        // against a brute-force sort of all 100 distances.
        let points = random_points(100, 0xFEED);
        let bvh = Bvh::build(&Parallel, &points);
        let preds = vec![nearest(Point3::ORIGIN, 10)];
        let results = query_default(&Parallel, &bvh, &preds);
        check_offsets_law(&results, 1);
        assert_eq!(results.values.len(), 10);

        let mut got: Vec<f32> = results
            .values
            .iter()
            .map(|h| h.distance.expect("nearest hits carry a distance"))
            .collect();
        got.sort_by(f32::total_cmp);

        let mut brute: Vec<f32> = points
            .iter()
            .map(|p| Aabb3::from_point(*p).distance_squared(Point3::ORIGIN).sqrt())
            .collect();
        brute.sort_by(f32::total_cmp);
        for (g, b) in got.iter().zip(&brute[..10]) {
            assert!((g - b).abs() <= f32::EPSILON * 8.0, "distances must match");
        }
    }

    #[test]
    fn mixed_batch_with_invalid_predicate() {
        let points = random_points(40, 0x0DDB);
        let bvh = Bvh::build(&Sequential, &points);
        let preds = vec![
            intersects(cube(-1.0, -1.0, -1.0, 2.0)),
            // Inverted box: absorbed as an empty segment, batch continues.
            intersects(Aabb3::from_corners(1.0, 0.0, 0.0, 0.0, 1.0, 1.0)),
            nearest(Point3::new(f32::NAN, 0.0, 0.0), 3),
            nearest(Point3::ORIGIN, 5),
        ];
        let results = query_default(&Sequential, &bvh, &preds);
        check_offsets_law(&results, 4);
        assert!(results.segment(1).is_empty());
        assert!(results.segment(2).is_empty());
        assert_eq!(results.segment(3).len(), 5);
        assert!(!results.segment(0).is_empty());
    }

    #[test]
    fn custom_callback_filters_matches() {
        // Forward only even primitive indices; the two-pass protocol must
        // still size segments correctly.
        struct EvenOnly;
        impl QueryCallback<u32> for EvenOnly {
            fn on_intersects(&self, _: &Predicate, primitive: u32, out: &mut OutputSink<'_, u32>) {
                if primitive % 2 == 0 {
                    out.push(primitive);
                }
            }
            fn on_nearest(
                &self,
                _: &Predicate,
                primitive: u32,
                _: f32,
                out: &mut OutputSink<'_, u32>,
            ) {
                if primitive % 2 == 0 {
                    out.push(primitive);
                }
            }
        }

        let boxes: Vec<Aabb3> = (0..9).map(|i| cube(i as f32, 0.0, 0.0, 0.5)).collect();
        let bvh = Bvh::build(&Sequential, &boxes);
        let preds = vec![intersects(cube(-1.0, -1.0, -1.0, 20.0))];
        let results = query(&Sequential, &bvh, &preds, &EvenOnly);
        let mut got = results.values.clone();
        got.sort_unstable();
        assert_eq!(got, vec![0, 2, 4, 6, 8]);
        check_offsets_law(&results, 1);
    }

    #[test]
    fn raw_traverse_counts_without_buffer() {
        let points = random_points(64, 0xC0FE);
        let bvh = Bvh::build(&Parallel, &points);
        let preds = vec![
            intersects(cube(-1.0, -1.0, -1.0, 2.0)),
            nearest(Point3::ORIGIN, 6),
        ];
        let counter = AtomicUsize::new(0);
        traverse(&Parallel, &bvh, &preds, |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        });
        // Everything intersects the covering box, plus 6 nearest hits.
        assert_eq!(counter.load(Ordering::Relaxed), 64 + 6);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let points = random_points(120, 0xA11CE);
        let bvh = Bvh::build(&Parallel, &points);
        let mut rng = Rng(0xB0B);
        let mut preds: Vec<Predicate> = (0..20)
            .map(|_| {
                intersects(cube(
                    rng.next_f32(-1.0, 0.5),
                    rng.next_f32(-1.0, 0.5),
                    rng.next_f32(-1.0, 0.5),
                    0.8,
                ))
            })
            .collect();
        preds.push(nearest(Point3::ORIGIN, 9));

        let seq = query_default(&Sequential, &bvh, &preds);
        let par = query_default(&Parallel, &bvh, &preds);
        assert_eq!(seq.offsets, par.offsets);
        for q in 0..preds.len() {
            let mut a: Vec<u32> = seq.segment(q).iter().map(|h| h.primitive).collect();
            let mut b: Vec<u32> = par.segment(q).iter().map(|h| h.primitive).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b, "segment {q} must not depend on the backend");
        }
    }
}
