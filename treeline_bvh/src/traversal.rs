// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-predicate traversal: stack descent for intersection queries and
//! branch-and-bound priority traversal for nearest-neighbor queries.
//!
//! One traversal serves one predicate against one hierarchy; the batched
//! driver in [`crate::query`] runs many of these concurrently, which is
//! safe because traversal only reads the tree.

use core::cmp::Ordering;
use std::collections::BinaryHeap;

use smallvec::SmallVec;

use crate::tree::{Bvh, Kind, NodeIdx};
use crate::types::{Aabb3, Point3};

/// Invoke `visit` for every primitive whose box overlaps `query`.
///
/// Plain stack descent: a node whose box misses the query prunes its whole
/// subtree. Visit order is traversal order, not sorted.
pub(crate) fn for_each_intersecting(bvh: &Bvh, query: &Aabb3, mut visit: impl FnMut(u32)) {
    let Some(root) = bvh.root() else {
        return;
    };
    let mut stack: SmallVec<[NodeIdx; 64]> = SmallVec::new();
    stack.push(root);
    while let Some(idx) = stack.pop() {
        let node = bvh.node(idx);
        if !node.bbox.intersects(query) {
            continue;
        }
        match node.kind {
            Kind::Leaf { primitive } => visit(primitive),
            Kind::Internal { left, right } => {
                stack.push(left);
                stack.push(right);
            }
        }
    }
}

/// Frontier entry ordered so the candidate with the smallest lower-bound
/// distance pops first (`BinaryHeap` is a max-heap, so the order is
/// reversed). The node index breaks distance ties to keep `Ord` total.
struct Candidate {
    dist2: f32,
    node: NodeIdx,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist2
            .total_cmp(&self.dist2)
            .then_with(|| other.node.get().cmp(&self.node.get()))
    }
}

/// Entry in the bounded best-k structure; the worst kept candidate sits on
/// top so it can be evicted in O(log k).
struct Kept {
    dist2: f32,
    primitive: u32,
}

impl PartialEq for Kept {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Kept {}

impl PartialOrd for Kept {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Kept {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then_with(|| self.primitive.cmp(&other.primitive))
    }
}

/// Invoke `visit(primitive, distance)` for the `k` primitives whose boxes
/// are nearest to `query`, fewer if the tree holds fewer.
///
/// Branch-and-bound: nodes are processed in order of increasing lower-bound
/// distance, so once the best-k structure is full and the frontier's head
/// exceeds the current k-th best, nothing closer can remain and traversal
/// stops. Distances reported are Euclidean point-to-box distances; visit
/// order is unspecified.
pub(crate) fn for_each_nearest(
    bvh: &Bvh,
    query: Point3,
    k: usize,
    mut visit: impl FnMut(u32, f32),
) {
    let Some(root) = bvh.root() else {
        return;
    };
    if k == 0 {
        return;
    }

    let mut kept: BinaryHeap<Kept> = BinaryHeap::with_capacity(k + 1);
    let mut frontier: BinaryHeap<Candidate> = BinaryHeap::new();
    frontier.push(Candidate {
        dist2: bvh.node(root).bbox.distance_squared(query),
        node: root,
    });

    while let Some(Candidate { dist2, node }) = frontier.pop() {
        let worst = kept.peek().map_or(f32::INFINITY, |w| w.dist2);
        if kept.len() == k && dist2 > worst {
            // The frontier is ordered, so every remaining candidate is at
            // least this far away.
            break;
        }
        match bvh.node(node).kind {
            Kind::Leaf { primitive } => {
                if kept.len() < k {
                    kept.push(Kept { dist2, primitive });
                } else if dist2 < worst {
                    kept.pop();
                    kept.push(Kept { dist2, primitive });
                }
            }
            Kind::Internal { left, right } => {
                for child in [left, right] {
                    let d2 = bvh.node(child).bbox.distance_squared(query);
                    if kept.len() < k || d2 <= worst {
                        frontier.push(Candidate { dist2: d2, node: child });
                    }
                }
            }
        }
    }

    for Kept { dist2, primitive } in kept {
        visit(primitive, dist2.sqrt());
    }
}
