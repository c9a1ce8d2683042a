// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CSR-style query output: a flattened values array plus a per-predicate
//! offsets array.
//!
//! Batched queries never grow one shared buffer under contention. Instead
//! the driver runs each predicate twice: a count pass sizes every segment,
//! an exclusive prefix sum turns counts into offsets, and a fill pass
//! writes each match through an atomic per-segment cursor. Segment
//! boundaries are therefore deterministic even though match order within a
//! segment is traversal order.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Batched query results in CSR layout.
///
/// Results for predicate `i` occupy `values[offsets[i]..offsets[i + 1]]`.
/// The offsets array is non-decreasing, starts at 0, and its last entry
/// equals `values.len()`; every predicate is represented, empty segments
/// included.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResults<V> {
    /// Flattened match values in predicate order.
    pub values: Vec<V>,
    /// Segment offsets; length is the number of predicates plus one.
    pub offsets: Vec<usize>,
}

impl<V> QueryResults<V> {
    /// Number of predicates the batch ran.
    pub fn num_predicates(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// The matches for predicate `index`.
    pub fn segment(&self, index: usize) -> &[V] {
        &self.values[self.offsets[index]..self.offsets[index + 1]]
    }

    /// Total number of matches across all predicates.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no predicate matched anything.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where a match accepted by a callback goes.
///
/// During the count pass a push only bumps the segment's size; during the
/// fill pass it claims the next slot in the segment via an atomic cursor
/// and writes the value there.
pub struct OutputSink<'a, V> {
    mode: SinkMode<'a, V>,
}

enum SinkMode<'a, V> {
    Count { count: &'a mut usize },
    Fill {
        slots: &'a [OnceLock<V>],
        cursor: &'a AtomicUsize,
    },
}

impl<'a, V> OutputSink<'a, V> {
    pub(crate) fn counting(count: &'a mut usize) -> Self {
        Self {
            mode: SinkMode::Count { count },
        }
    }

    pub(crate) fn filling(slots: &'a [OnceLock<V>], cursor: &'a AtomicUsize) -> Self {
        Self {
            mode: SinkMode::Fill { slots, cursor },
        }
    }

    /// Accept a match into the output buffer.
    pub fn push(&mut self, value: V) {
        match &mut self.mode {
            SinkMode::Count { count } => **count += 1,
            SinkMode::Fill { slots, cursor } => {
                let at = cursor.fetch_add(1, Ordering::Relaxed);
                let _ = slots[at].set(value);
            }
        }
    }
}

impl<V> core::fmt::Debug for OutputSink<'_, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mode = match self.mode {
            SinkMode::Count { .. } => "count",
            SinkMode::Fill { .. } => "fill",
        };
        f.debug_struct("OutputSink").field("mode", &mode).finish()
    }
}

/// Exclusive prefix sum of per-predicate counts into an offsets array of
/// length `counts.len() + 1`.
pub(crate) fn exclusive_prefix_sum(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut running = 0;
    offsets.push(0);
    for &c in counts {
        running += c;
        offsets.push(running);
    }
    offsets
}

/// Collect filled slots into the final values array.
///
/// Every reserved slot must have been written by the fill pass; the count
/// and fill passes disagree only if a callback forwards different matches
/// on its two invocations, which the callback contract forbids.
pub(crate) fn into_values<V>(slots: Vec<OnceLock<V>>) -> Vec<V> {
    slots
        .into_iter()
        .map(|cell| {
            cell.into_inner()
                .expect("fill pass writes every slot reserved by the count pass")
        })
        .collect()
}
