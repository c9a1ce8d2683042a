// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounding volume hierarchy: flattened node arena and parallel construction.
//!
//! Construction is the classic linear-BVH scheme: sort primitives along a
//! Morton curve, derive the binary radix tree implied by the sorted keys
//! (each internal node splits at the highest differing key bit of its
//! range), then propagate boxes bottom-up. Every phase is dispatched
//! through an [`Executor`], so the same code runs single-threaded or on a
//! thread pool.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use crate::access::Primitives;
use crate::executor::Executor;
use crate::morton::morton_key;
use crate::types::Aabb3;

/// Index of a node in the flattened arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct NodeIdx(u32);

impl NodeIdx {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Arena indices are intentionally 32-bit; trees beyond 2^31 leaves are out of scope."
    )]
    const fn new(i: usize) -> Self {
        Self(i as u32)
    }

    pub(crate) const fn get(self) -> usize {
        self.0 as usize
    }
}

pub(crate) enum Kind {
    Leaf {
        /// Index of the wrapped primitive in the caller's collection.
        primitive: u32,
    },
    Internal {
        left: NodeIdx,
        right: NodeIdx,
    },
}

pub(crate) struct Node {
    pub(crate) bbox: Aabb3,
    pub(crate) kind: Kind,
}

/// An immutable bounding volume hierarchy over a primitive collection.
///
/// Built once with [`Bvh::build`], then queried any number of times; the
/// tree never changes after construction, so concurrent queries need no
/// locking. Primitives are referenced by index only, never owned.
///
/// For `N` primitives the arena holds exactly `2N - 1` nodes (`N` leaves,
/// `N - 1` internal nodes); internal nodes occupy `[0, N - 1)` with the
/// root at index 0, leaves follow in Morton order.
pub struct Bvh {
    nodes: Vec<Node>,
    root: Option<NodeIdx>,
    leaf_count: usize,
    bounds: Aabb3,
}

impl Bvh {
    /// Build a hierarchy over the collection, dispatching parallel phases
    /// through `executor`.
    ///
    /// An empty collection yields an empty hierarchy on which every query
    /// trivially returns no results.
    pub fn build<E, P>(executor: &E, primitives: &P) -> Self
    where
        E: Executor,
        P: Primitives + ?Sized,
    {
        let n = primitives.len();
        if n == 0 {
            return Self {
                nodes: Vec::new(),
                root: None,
                leaf_count: 0,
                bounds: Aabb3::EMPTY,
            };
        }

        // Phase 1: per-primitive boxes, then the scene box by reduction.
        let boxes: Vec<Aabb3> = executor.map(n, |i| primitives.bounds(i));
        let scene = executor.reduce(n, Aabb3::EMPTY, |i| boxes[i], Aabb3::union);

        if n == 1 {
            return Self {
                nodes: vec![Node {
                    bbox: boxes[0],
                    kind: Kind::Leaf { primitive: 0 },
                }],
                root: Some(NodeIdx::new(0)),
                leaf_count: 1,
                bounds: scene,
            };
        }

        // Phase 2: Morton keys of normalized centroids, sorted. The index
        // half of each pair breaks key ties, which pins the tree shape for
        // identical inputs.
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Arena indices are intentionally 32-bit; trees beyond 2^31 leaves are out of scope."
        )]
        let mut order: Vec<(u32, u32)> =
            executor.map(n, |i| (morton_key(&boxes[i], &scene), i as u32));
        executor.sort_pairs(&mut order);

        // Phase 3: radix-tree topology, one independent unit per internal node.
        let children: Vec<(NodeIdx, NodeIdx)> =
            executor.map(n - 1, |i| radix_children(&order, i, n));

        // Parent links for the bottom-up climb.
        let mut parents: Vec<u32> = vec![0; 2 * n - 1];
        for (i, (l, r)) in children.iter().enumerate() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Arena indices are intentionally 32-bit; trees beyond 2^31 leaves are out of scope."
            )]
            let p = i as u32;
            parents[l.get()] = p;
            parents[r.get()] = p;
        }

        // Phase 4: bottom-up box propagation. Each internal node carries an
        // arrival counter; the first climber to reach it stops, the second
        // one finds both children finished, unions their boxes, sets the
        // node's box exactly once, and keeps climbing.
        let counters: Vec<AtomicU32> = (0..n - 1).map(|_| AtomicU32::new(0)).collect();
        let internal_boxes: Vec<OnceLock<Aabb3>> = (0..n - 1).map(|_| OnceLock::new()).collect();
        let child_box = |idx: NodeIdx| -> Aabb3 {
            if idx.get() < n - 1 {
                *internal_boxes[idx.get()]
                    .get()
                    .expect("both subtrees finished before their parent is aggregated")
            } else {
                boxes[order[idx.get() - (n - 1)].1 as usize]
            }
        };
        executor.for_each(n, |leaf| {
            let mut node = n - 1 + leaf;
            loop {
                let parent = parents[node] as usize;
                if counters[parent].fetch_add(1, Ordering::AcqRel) == 0 {
                    return;
                }
                let (l, r) = children[parent];
                let _ = internal_boxes[parent].set(child_box(l).union(child_box(r)));
                if parent == 0 {
                    return;
                }
                node = parent;
            }
        });

        // Assemble the arena: internal nodes first, leaves in Morton order.
        let mut nodes = Vec::with_capacity(2 * n - 1);
        for (cell, &(left, right)) in internal_boxes.into_iter().zip(&children) {
            let bbox = cell
                .into_inner()
                .expect("every internal node is aggregated exactly once");
            nodes.push(Node {
                bbox,
                kind: Kind::Internal { left, right },
            });
        }
        for &(_, primitive) in &order {
            nodes.push(Node {
                bbox: boxes[primitive as usize],
                kind: Kind::Leaf { primitive },
            });
        }
        debug_assert_eq!(nodes.len(), 2 * n - 1);

        Self {
            nodes,
            root: Some(NodeIdx::new(0)),
            leaf_count: n,
            bounds: scene,
        }
    }

    /// Number of primitives indexed by the hierarchy.
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    /// Whether the hierarchy indexes no primitives.
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Total node count: `2N - 1` for `N` primitives, 0 when empty.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The union of all primitive boxes, or [`Aabb3::EMPTY`] when empty.
    pub fn bounds(&self) -> Aabb3 {
        self.bounds
    }

    pub(crate) fn root(&self) -> Option<NodeIdx> {
        self.root
    }

    pub(crate) fn node(&self, idx: NodeIdx) -> &Node {
        &self.nodes[idx.get()]
    }
}

impl core::fmt::Debug for Bvh {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bvh")
            .field("leaves", &self.leaf_count)
            .field("arena_nodes", &self.nodes.len())
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// Children of internal node `i` in the radix tree over `order`, following
/// the linear-BVH construction: the node covers the maximal key range whose
/// common prefix exceeds the neighbors', and splits at the highest differing
/// bit inside it.
#[allow(
    clippy::cast_possible_truncation,
    reason = "positions fit in 32 bits by the arena's own limit"
)]
fn radix_children(order: &[(u32, u32)], i: usize, n: usize) -> (NodeIdx, NodeIdx) {
    // Common-prefix length of the augmented keys at a and b; -1 outside the
    // range. Equal Morton keys fall back to the leaf positions, which are
    // unique, so prefixes are always well ordered.
    let delta = |a: isize, b: isize| -> i64 {
        if b < 0 || b >= n as isize {
            return -1;
        }
        let ka = order[a as usize].0;
        let kb = order[b as usize].0;
        if ka == kb {
            32 + i64::from(((a ^ b) as u32).leading_zeros())
        } else {
            i64::from((ka ^ kb).leading_zeros())
        }
    };
    let leaf = |pos: isize| NodeIdx::new(n - 1 + pos as usize);
    let internal = |pos: isize| NodeIdx::new(pos as usize);

    let i = i as isize;
    // Direction of the node's range: toward the neighbor sharing the longer
    // prefix.
    let d: isize = if delta(i, i + 1) >= delta(i, i - 1) { 1 } else { -1 };
    let delta_min = delta(i, i - d);

    // Exponential probe, then binary search, for the other end of the range.
    let mut l_max: isize = 2;
    while delta(i, i + l_max * d) > delta_min {
        l_max *= 2;
    }
    let mut l: isize = 0;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(i, i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }
    let j = i + l * d;

    // Binary search for the split: the last position sharing a strictly
    // longer prefix with i than the whole range does.
    let delta_node = delta(i, j);
    let mut s: isize = 0;
    let mut t = (l + 1).div_euclid(2);
    loop {
        if delta(i, i + (s + t) * d) > delta_node {
            s += t;
        }
        if t == 1 {
            break;
        }
        t = (t + 1).div_euclid(2);
    }
    let gamma = i + s * d + d.min(0);

    let (lo, hi) = (i.min(j), i.max(j));
    let left = if lo == gamma {
        leaf(gamma)
    } else {
        internal(gamma)
    };
    let right = if hi == gamma + 1 {
        leaf(gamma + 1)
    } else {
        internal(gamma + 1)
    };
    (left, right)
}
