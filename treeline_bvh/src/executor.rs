// Copyright 2025 the Treeline Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Execution backends: bulk-parallel dispatch behind a small capability trait.
//!
//! Builds and queries are fork-join: a call dispatches `n` independent units
//! of work and blocks until all of them finish. The engine never inspects
//! scheduling beyond that, so closures must be safe under arbitrary
//! interleaving and must not rely on ordering between units.

use rayon::prelude::*;

/// Bulk-parallel execution capability consumed by builds and queries.
pub trait Executor: Sync {
    /// Run `op` for every index in `0..n`, collecting results in index order.
    fn map<T, F>(&self, n: usize, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;

    /// Run `op` for every index in `0..n` for its side effects.
    fn for_each<F>(&self, n: usize, op: F)
    where
        F: Fn(usize) + Sync + Send;

    /// Combine `op(0..n)` with `combine`, starting from `identity`.
    fn reduce<T, F, C>(&self, n: usize, identity: T, op: F, combine: C) -> T
    where
        T: Copy + Send + Sync,
        F: Fn(usize) -> T + Sync + Send,
        C: Fn(T, T) -> T + Sync + Send;

    /// Sort key/value pairs ascending. Equal keys fall back to the value
    /// half, which makes the order total and deterministic.
    fn sort_pairs(&self, pairs: &mut [(u32, u32)]);
}

/// Single-threaded backend. Useful for tests, debugging, and tiny inputs.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sequential;

impl Executor for Sequential {
    fn map<T, F>(&self, n: usize, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..n).map(op).collect()
    }

    fn for_each<F>(&self, n: usize, op: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        for i in 0..n {
            op(i);
        }
    }

    fn reduce<T, F, C>(&self, n: usize, identity: T, op: F, combine: C) -> T
    where
        T: Copy + Send + Sync,
        F: Fn(usize) -> T + Sync + Send,
        C: Fn(T, T) -> T + Sync + Send,
    {
        (0..n).map(op).fold(identity, &combine)
    }

    fn sort_pairs(&self, pairs: &mut [(u32, u32)]) {
        pairs.sort_unstable();
    }
}

/// Multi-core backend dispatching onto the global rayon thread pool.
#[derive(Copy, Clone, Debug, Default)]
pub struct Parallel;

impl Executor for Parallel {
    fn map<T, F>(&self, n: usize, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        (0..n).into_par_iter().map(op).collect()
    }

    fn for_each<F>(&self, n: usize, op: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        (0..n).into_par_iter().for_each(op);
    }

    fn reduce<T, F, C>(&self, n: usize, identity: T, op: F, combine: C) -> T
    where
        T: Copy + Send + Sync,
        F: Fn(usize) -> T + Sync + Send,
        C: Fn(T, T) -> T + Sync + Send,
    {
        (0..n)
            .into_par_iter()
            .map(op)
            .reduce(|| identity, &combine)
    }

    fn sort_pairs(&self, pairs: &mut [(u32, u32)]) {
        pairs.par_sort_unstable();
    }
}
