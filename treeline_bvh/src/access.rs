// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Capability traits for reading caller-owned collections by index.
//!
//! The engine never owns or copies primitives or predicates; it only needs
//! a size and an indexed getter. Any collection type can participate by
//! implementing one of these traits, without deriving from a library type.

use crate::predicate::Predicate;
use crate::types::{Aabb3, Point3};

/// Types that can report an axis-aligned bounding box for themselves.
pub trait Bounded {
    /// The bounding box of this value.
    fn bounds(&self) -> Aabb3;
}

impl Bounded for Aabb3 {
    fn bounds(&self) -> Aabb3 {
        *self
    }
}

impl Bounded for Point3 {
    fn bounds(&self) -> Aabb3 {
        Aabb3::from_point(*self)
    }
}

/// Read-only, indexable view over a primitive collection.
///
/// Contract: the engine only calls `bounds(i)` with `i < len()`, and the
/// collection must not change for the duration of a build.
pub trait Primitives: Sync {
    /// Number of primitives.
    fn len(&self) -> usize;

    /// Bounding box of primitive `index`.
    fn bounds(&self, index: usize) -> Aabb3;

    /// Whether the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Bounded + Sync> Primitives for [T] {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn bounds(&self, index: usize) -> Aabb3 {
        self[index].bounds()
    }
}

impl<T: Bounded + Sync> Primitives for Vec<T> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn bounds(&self, index: usize) -> Aabb3 {
        self[index].bounds()
    }
}

/// Read-only, indexable view over a predicate collection.
///
/// Contract: the engine only calls `get(i)` with `i < len()`, and the
/// collection must not change for the duration of a query.
pub trait Predicates: Sync {
    /// Number of predicates.
    fn len(&self) -> usize;

    /// Predicate `index`.
    fn get(&self, index: usize) -> Predicate;

    /// Whether the collection is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Predicates for [Predicate] {
    fn len(&self) -> usize {
        <[Predicate]>::len(self)
    }

    fn get(&self, index: usize) -> Predicate {
        self[index]
    }
}

impl Predicates for Vec<Predicate> {
    fn len(&self) -> usize {
        Self::len(self)
    }

    fn get(&self, index: usize) -> Predicate {
        self[index]
    }
}
