//! Executes one [`ExecutionBatch`] across a rayon thread pool with a single
//! wait-all join, rather than one join per system.
//!
//! Grounded directly on `saptak7777-Archetype-ECS/src/parallel.rs`'s
//! `ParallelExecutor::execute_stage`: a `&mut World` and `&mut [BoxedSystem]`
//! are each cast to a `usize` so they can cross the `rayon::par_iter`
//! closure's `Send` boundary, then cast back inside the closure. The cast is
//! sound only because [`DependencyGraph`](crate::dependency::DependencyGraph)
//! has already proven every system in this batch touches disjoint component
//! types — see the safety comment on [`execute_batch`] for the restated
//! invariants in this crate's own terms, not copied verbatim from the
//! teacher's.

use std::time::{Duration, Instant};

use ecs_core::prelude::CommandBuffer;
use ecs_core::world::World;
use rayon::prelude::*;

use crate::dependency::ExecutionBatch;
use crate::system::BoxedSystem;

/// One system's outcome from a batch run: its registration index, how long
/// `run` took (up to the panic, if it panicked), and whether it panicked.
pub struct SystemRunOutcome {
    pub system_index: usize,
    pub elapsed: Duration,
    pub panicked: bool,
}

/// Run every system named in `batch` concurrently against `world`, then wait
/// for all of them before returning — the "wait-all join" the parallel batch
/// model calls for, as opposed to joining after each individual system.
///
/// A system that panics is caught per-system: the panic is logged and the
/// rest of the batch still runs to completion, matching the scheduler's
/// "a system update panics → logged, statistics updated, scheduler continues
/// with the remainder of the batch" failure policy. Without the
/// `catch_unwind` here, rayon would propagate the panic to the caller after
/// abandoning every other task in this `par_iter`.
///
/// # Safety argument
///
/// 1. **Disjoint access**: `batch` only ever contains systems the dependency
///    graph placed together because no pair's `SystemAccess` conflicts —
///    neither writes a component type another reads or writes.
/// 2. **Unique indices**: `batch.system_indices` are distinct by
///    construction (`DependencyGraph::build` never duplicates a system index
///    across or within a batch).
/// 3. **No escaping references**: the raw pointers reconstructed inside the
///    closure are only dereferenced for the duration of one `system.run`
///    call and never stored past it.
///
/// Given (1)-(3), handing out `batch.len()` concurrent `&mut World`s that
/// each only ever touch disjoint component columns is sound even though the
/// compiler cannot see it — the conflict analysis is the proof the borrow
/// checker can't perform.
pub fn execute_batch(
    batch: &ExecutionBatch,
    systems: &mut [BoxedSystem],
    world: &mut World,
    commands: &CommandBuffer,
) -> Vec<SystemRunOutcome> {
    let systems_ptr = systems.as_mut_ptr() as usize;
    let world_ptr = world as *mut World as usize;

    batch
        .system_indices
        .par_iter()
        .map(|&sys_idx| {
            #[allow(unsafe_code)]
            let system = unsafe { &mut *(systems_ptr as *mut BoxedSystem).add(sys_idx) };
            #[allow(unsafe_code)]
            let world = unsafe { &mut *(world_ptr as *mut World) };

            let start = Instant::now();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| system.run(world, commands)));
            let elapsed = start.elapsed();
            let panicked = result.is_err();
            if panicked {
                tracing::error!(system = system.name(), "system panicked during batch execution; continuing with the remainder of the batch");
            }
            SystemRunOutcome {
                system_index: sys_idx,
                elapsed,
                panicked,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{System, SystemAccess, TickRate};
    use ecs_core::prelude::ComponentTypeRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingSystem {
        counter: Arc<AtomicUsize>,
    }

    impl System for CountingSystem {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn access(&self) -> SystemAccess {
            SystemAccess::empty()
        }
        fn tick_rate(&self) -> TickRate {
            TickRate::EveryFrame
        }
        fn run(&mut self, _world: &mut World, _commands: &CommandBuffer) {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn every_system_in_the_batch_runs_exactly_once() {
        let registry = ComponentTypeRegistry::new();
        let mut world = World::new(registry);
        let commands = CommandBuffer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut systems: Vec<BoxedSystem> = (0..8)
            .map(|_| Box::new(CountingSystem { counter: counter.clone() }) as BoxedSystem)
            .collect();
        let batch = ExecutionBatch {
            system_indices: (0..8).collect(),
        };

        let outcomes = execute_batch(&batch, &mut systems, &mut world, &commands);
        assert_eq!(counter.load(Ordering::SeqCst), 8);
        assert_eq!(outcomes.len(), 8);
        assert!(outcomes.iter().all(|o| !o.panicked));
    }

    struct PanickingSystem {
        counter: Arc<AtomicUsize>,
    }

    impl System for PanickingSystem {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn access(&self) -> SystemAccess {
            SystemAccess::empty()
        }
        fn run(&mut self, _world: &mut World, _commands: &CommandBuffer) {
            self.counter.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        }
    }

    #[test]
    fn a_panicking_system_does_not_stop_the_rest_of_the_batch() {
        let registry = ComponentTypeRegistry::new();
        let mut world = World::new(registry);
        let commands = CommandBuffer::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let mut systems: Vec<BoxedSystem> = vec![
            Box::new(PanickingSystem { counter: counter.clone() }),
            Box::new(CountingSystem { counter: counter.clone() }),
            Box::new(CountingSystem { counter: counter.clone() }),
        ];
        let batch = ExecutionBatch {
            system_indices: vec![0, 1, 2],
        };

        let outcomes = execute_batch(&batch, &mut systems, &mut world, &commands);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(outcomes.iter().filter(|o| o.panicked).count(), 1);
        assert_eq!(outcomes.iter().filter(|o| !o.panicked).count(), 2);
    }
}
