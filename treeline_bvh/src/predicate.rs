// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Query predicates: region intersection and k-nearest-neighbor.

use crate::types::{Aabb3, Point3};

/// A spatial query shape, tagged with its semantics.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Match every primitive whose box overlaps the given box.
    Intersects(Aabb3),
    /// Match the `k` primitives nearest to the point.
    Nearest(Point3, usize),
}

/// Build an intersection predicate for the given box.
pub fn intersects(bounds: Aabb3) -> Predicate {
    Predicate::Intersects(bounds)
}

/// Build a k-nearest-neighbor predicate for the given point.
pub fn nearest(point: Point3, k: usize) -> Predicate {
    Predicate::Nearest(point, k)
}

impl Predicate {
    /// Whether the predicate is well-formed.
    ///
    /// A malformed predicate (non-finite coordinates, inverted query box)
    /// produces an empty result segment instead of aborting the batch.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Intersects(b) => b.is_finite() && !b.is_empty(),
            Self::Nearest(p, _) => p.is_finite(),
        }
    }
}
