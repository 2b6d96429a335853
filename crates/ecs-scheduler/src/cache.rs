//! Caches the filtered batch plan for a given tick's active system set.
//!
//! Dropping a node from an already conflict-free batch plan can never
//! introduce a new conflict, so a tick whose due systems are a subset of the
//! full system list can reuse the full [`DependencyGraph`](crate::dependency::DependencyGraph)'s
//! batch order by simply filtering out the systems not due this tick. What's
//! worth memoizing is that filter step itself: many consecutive ticks share
//! the exact same due set (e.g. two `Hz(2)` systems both due on every even
//! tick), so the cache key is the due set's own identity — the literal
//! sorted list of system indices — not merely how many systems are in it.
//! Two different five-system due-sets are different cache entries.

use rustc_hash::FxHashMap;

use crate::dependency::{DependencyGraph, ExecutionBatch};

#[derive(Default)]
pub struct BatchCache {
    entries: FxHashMap<Vec<usize>, Vec<ExecutionBatch>>,
}

impl BatchCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `due` need not be sorted; it is sorted internally to normalize the
    /// cache key. Returns the full graph's batches filtered down to `due`,
    /// in the same relative order, with empty batches dropped.
    pub fn active_batches(&mut self, graph: &DependencyGraph, due: &[usize]) -> &[ExecutionBatch] {
        let mut key = due.to_vec();
        key.sort_unstable();

        self.entries.entry(key.clone()).or_insert_with(|| {
            let due_set: rustc_hash::FxHashSet<usize> = key.iter().copied().collect();
            graph
                .batches()
                .iter()
                .filter_map(|batch| {
                    let filtered: Vec<usize> = batch.system_indices.iter().copied().filter(|i| due_set.contains(i)).collect();
                    (!filtered.is_empty()).then_some(ExecutionBatch { system_indices: filtered })
                })
                .collect()
        })
    }

    /// Must be called whenever the underlying system list or dependency
    /// graph changes — stale entries would otherwise silently outlive the
    /// plan they were filtered from.
    pub fn invalidate(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
