//! Builds parallel execution batches from explicit system ordering plus
//! read/write conflict analysis.
//!
//! Grounded on `saptak7777-Archetype-ECS/src/dependency.rs`'s
//! `DependencyGraph` (Kahn's algorithm with depth tracking, then a greedy
//! pass that repacks same-depth systems into the earliest conflict-free
//! batch) and on `nomai-engine/src/tick.rs`'s named `add_system_after`
//! ordering constraints, combined here into one graph: an edge exists
//! between two systems if either an explicit "after" constraint names them,
//! or their `SystemAccess` conflicts.

use std::collections::VecDeque;

use crate::error::SchedulerError;
use crate::system::SystemAccess;

/// A set of system indices cleared to run concurrently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionBatch {
    pub system_indices: Vec<usize>,
}

pub struct DependencyGraph {
    batches: Vec<ExecutionBatch>,
}

impl DependencyGraph {
    /// `explicit_after[i]` lists system indices that must complete before
    /// system `i` starts, independent of whether their accesses conflict.
    ///
    /// Fails outright on a cycle. Used for up-front validation (a host
    /// registering systems at startup wants a hard error, not a silently
    /// degraded schedule). The per-tick path the orchestrator actually calls
    /// is [`DependencyGraph::build_tolerant`], which never fails.
    pub fn build(accesses: &[SystemAccess], explicit_after: &[Vec<usize>]) -> Result<Self, SchedulerError> {
        let (graph, excluded) = Self::build_tolerant(accesses, explicit_after);
        if excluded.is_empty() {
            Ok(graph)
        } else {
            Err(SchedulerError::CircularDependency { cycle: excluded })
        }
    }

    /// Same batching algorithm as [`DependencyGraph::build`], but a cycle
    /// never aborts the whole graph: any system that never reaches in-degree
    /// zero (because it sits in, or transitively depends on, a cycle) is
    /// simply left out of every batch and returned in the second element, so
    /// the caller can log which systems were skipped and keep scheduling the
    /// rest.
    pub fn build_tolerant(accesses: &[SystemAccess], explicit_after: &[Vec<usize>]) -> (Self, Vec<usize>) {
        let count = accesses.len();
        if count == 0 {
            return (Self { batches: Vec::new() }, Vec::new());
        }

        // edges[u] = systems that must run after u (u -> v means u before v).
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];
        let mut in_degree = vec![0usize; count];

        for (v, predecessors) in explicit_after.iter().enumerate() {
            for &u in predecessors {
                edges[u].push(v);
                in_degree[v] += 1;
            }
        }
        for i in 0..count {
            for j in (i + 1)..count {
                if accesses[i].conflicts_with(&accesses[j]) {
                    edges[i].push(j);
                    in_degree[j] += 1;
                }
            }
        }

        let mut depths = vec![0usize; count];
        let mut queue: VecDeque<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(count);

        while let Some(node) = queue.pop_front() {
            sorted.push(node);
            for &next in &edges[node] {
                in_degree[next] -= 1;
                depths[next] = depths[next].max(depths[node] + 1);
                if in_degree[next] == 0 {
                    queue.push_back(next);
                }
            }
        }

        let excluded: Vec<usize> = (0..count).filter(|&i| in_degree[i] != 0).collect();

        // Greedily pack systems into the earliest batch whose depth is at
        // least their own and whose members don't conflict with them.
        let max_depth = *depths.iter().max().unwrap_or(&0);
        let mut batches: Vec<ExecutionBatch> = (0..=max_depth).map(|_| ExecutionBatch { system_indices: Vec::new() }).collect();

        for &sys_idx in &sorted {
            let mut placed = false;
            for batch in batches.iter_mut().skip(depths[sys_idx]) {
                let conflicts = batch
                    .system_indices
                    .iter()
                    .any(|&other| accesses[sys_idx].conflicts_with(&accesses[other]));
                if !conflicts {
                    batch.system_indices.push(sys_idx);
                    placed = true;
                    break;
                }
            }
            if !placed {
                batches.push(ExecutionBatch {
                    system_indices: vec![sys_idx],
                });
            }
        }

        batches.retain(|b| !b.system_indices.is_empty());
        (Self { batches }, excluded)
    }

    pub fn batches(&self) -> &[ExecutionBatch] {
        &self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecs_core::prelude::ComponentTypeId;

    fn access(reads: &[u32], writes: &[u32]) -> SystemAccess {
        SystemAccess {
            reads: reads.iter().map(|&i| ComponentTypeId(i)).collect(),
            writes: writes.iter().map(|&i| ComponentTypeId(i)).collect(),
        }
    }

    #[test]
    fn independent_reads_share_a_batch() {
        let accesses = vec![access(&[1], &[]), access(&[2], &[])];
        let graph = DependencyGraph::build(&accesses, &[vec![], vec![]]).unwrap();
        assert_eq!(graph.batch_count(), 1);
    }

    #[test]
    fn write_conflict_forces_sequential_batches() {
        let accesses = vec![access(&[], &[1]), access(&[1], &[])];
        let graph = DependencyGraph::build(&accesses, &[vec![], vec![]]).unwrap();
        assert_eq!(graph.batch_count(), 2);
    }

    #[test]
    fn explicit_after_orders_conflict_free_systems() {
        let accesses = vec![access(&[1], &[]), access(&[2], &[])];
        let graph = DependencyGraph::build(&accesses, &[vec![], vec![0]]).unwrap();
        assert_eq!(graph.batch_count(), 2);
        assert_eq!(graph.batches()[0].system_indices, vec![0]);
        assert_eq!(graph.batches()[1].system_indices, vec![1]);
    }

    #[test]
    fn cycle_is_detected() {
        let accesses = vec![access(&[], &[]), access(&[], &[])];
        let err = DependencyGraph::build(&accesses, &[vec![1], vec![0]]).unwrap_err();
        let SchedulerError::CircularDependency { cycle } = err;
        assert_eq!(cycle.len(), 2);
    }

    #[test]
    fn build_tolerant_schedules_the_acyclic_remainder() {
        // 0 <-> 1 cycle; 2 is independent and conflict-free.
        let accesses = vec![access(&[], &[]), access(&[], &[]), access(&[9], &[])];
        let (graph, excluded) = DependencyGraph::build_tolerant(&accesses, &[vec![1], vec![0], vec![]]);
        let mut excluded_sorted = excluded.clone();
        excluded_sorted.sort_unstable();
        assert_eq!(excluded_sorted, vec![0, 1]);
        let all_scheduled: Vec<usize> = graph.batches().iter().flat_map(|b| b.system_indices.clone()).collect();
        assert_eq!(all_scheduled, vec![2]);
    }

    #[test]
    fn diamond_dependency_batches_correctly() {
        // 0 writes A; 1 reads A writes B; 2 reads A writes C; 3 reads B,C
        let accesses = vec![
            access(&[], &[0]),
            access(&[0], &[1]),
            access(&[0], &[2]),
            access(&[1, 2], &[]),
        ];
        let graph = DependencyGraph::build(&accesses, &[vec![], vec![0], vec![0], vec![1, 2]]).unwrap();
        assert_eq!(graph.batch_count(), 3);
        assert_eq!(graph.batches()[0].system_indices, vec![0]);
        let mut middle = graph.batches()[1].system_indices.clone();
        middle.sort_unstable();
        assert_eq!(middle, vec![1, 2]);
        assert_eq!(graph.batches()[2].system_indices, vec![3]);
    }
}
