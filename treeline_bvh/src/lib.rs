// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Treeline BVH: a parallel 3D bounding volume hierarchy.
//!
//! Treeline builds a balanced binary hierarchy over a collection of spatial
//! primitives and runs batches of spatial queries against it.
//!
//! - Build once from anything that can report per-primitive bounding boxes;
//!   the tree is immutable afterwards (rebuild, don't update).
//! - Query with region-intersection or k-nearest-neighbor predicates, many
//!   at a time, in parallel across predicates.
//! - Route matches through a callback, collect them into a CSR buffer
//!   (flat values plus per-predicate offsets), or both.
//!
//! Construction is the linear-BVH scheme: Morton-sorted primitives, a
//! binary radix tree derived in parallel from the sorted keys, and
//! bottom-up box propagation with per-node arrival counters. Execution is
//! fork-join over a pluggable [`Executor`]; [`Parallel`] dispatches onto
//! the rayon thread pool, [`Sequential`] runs inline.
//!
//! # Example
//!
//! ```rust
//! use treeline_bvh::{Aabb3, Bvh, Point3, Sequential, intersects, nearest, query_default};
//!
//! // Index two primitives by their boxes.
//! let boxes = vec![
//!     Aabb3::from_corners(0.0, 0.0, 0.0, 1.0, 1.0, 1.0),
//!     Aabb3::from_corners(4.0, 4.0, 4.0, 5.0, 5.0, 5.0),
//! ];
//! let bvh = Bvh::build(&Sequential, &boxes);
//! assert_eq!(bvh.node_count(), 3);
//!
//! // Batch one intersection query and one 1-NN query.
//! let predicates = vec![
//!     intersects(Aabb3::from_corners(0.5, 0.5, 0.5, 2.0, 2.0, 2.0)),
//!     nearest(Point3::new(4.5, 4.5, 4.5), 1),
//! ];
//! let results = query_default(&Sequential, &bvh, &predicates);
//!
//! // Results for predicate i live in values[offsets[i]..offsets[i + 1]].
//! assert_eq!(results.segment(0).len(), 1);
//! assert_eq!(results.segment(0)[0].primitive, 0);
//! assert_eq!(results.segment(1)[0].primitive, 1);
//! assert_eq!(results.segment(1)[0].distance, Some(0.0));
//! ```
//!
//! Callers own their collections: the engine reads primitives and
//! predicates through the [`Primitives`] and [`Predicates`] capability
//! traits and never copies or retains them. Index-out-of-range access is a
//! caller contract violation, not a handled error; degenerate inputs (no
//! primitives, `k = 0`) are valid and yield empty results.
//!
//! ## Float semantics
//!
//! Coordinates are `f32` and assumed NaN-free. A predicate carrying
//! non-finite coordinates is absorbed as an empty result segment rather
//! than aborting its batch.

pub mod access;
pub mod executor;
mod morton;
pub mod output;
pub mod predicate;
pub mod query;
mod traversal;
pub mod tree;
pub mod types;

pub use access::{Bounded, Predicates, Primitives};
pub use executor::{Executor, Parallel, Sequential};
pub use output::{OutputSink, QueryResults};
pub use predicate::{Predicate, intersects, nearest};
pub use query::{ForwardAll, Hit, QueryCallback, query, query_default, traverse};
pub use tree::Bvh;
pub use types::{Aabb3, Point3};
