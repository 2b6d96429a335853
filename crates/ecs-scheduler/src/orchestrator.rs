//! Drives a [`World`] through one fixed-timestep frame at a time.
//!
//! Grounded on `nomai-engine/src/tick.rs`'s `TickLoop`: same
//! `add_system`/`add_system_after` registration surface, the same
//! `tick_counter as f64 * fixed_dt` formula for `sim_time` (never an
//! accumulated float sum, to avoid drift), and the same per-tick
//! `TickDiagnostics`. The single-pass tick loop there becomes an eight-phase
//! one here, driven by [`crate::dependency::DependencyGraph`] /
//! [`crate::parallel::execute_batch`] instead of calling systems in plain
//! registration order.
//!
//! Tick phases, in order: advance time; drain the system registration queue
//! (register/enable/disable/unregister requests queued since the last tick);
//! drain the command buffer (applies queued creates/destroys immediately,
//! queues add/remove for the next phase) and fire the batch-created/destroyed
//! events off its report; apply queued component add/remove ops (removes
//! fully, then adds fully, both FIFO); debug-only structural validation; run
//! this tick's due, enabled systems in dependency/conflict batches, recording
//! last/average/peak timing per system into [`crate::stats::SystemStatsTable`]
//! (a panicking system is caught, logged, and does not stop the rest of its
//! batch); fire `WorldSystemsUpdated`; increment the tick counter.
//!
//! A dependency cycle never aborts a tick: [`crate::dependency::DependencyGraph::build_tolerant`]
//! excludes whichever systems never resolve to in-degree zero and the
//! orchestrator logs and simply does not run them this tick (or any
//! subsequent tick, until the cycle is broken by a registration change).

use std::time::Instant;

use ecs_core::prelude::CommandBuffer;
use ecs_core::world::World;

use crate::cache::BatchCache;
use crate::config::TickConfig;
use crate::dependency::DependencyGraph;
use crate::events::{
    EntityBatchCreated, EntityBatchDestroyRequest, EntityBatchDestroyed, EventBus, WorldLoad, WorldLoaded, WorldSave,
    WorldSaved, WorldSystemsUpdated,
};
use crate::persistence::{LoadProfile, SaveProfile};
use crate::stats::{SystemStats, SystemStatsTable, TickDiagnostics};
use crate::system::{BoxedSystem, System};

/// A registration-surface change requested between (or during) ticks,
/// applied at the next tick's phase 2.
///
/// Systems are never physically removed from `systems`/`explicit_after` once
/// registered — other systems' `after` edges reference them by index, and
/// removing an entry would silently renumber every system after it.
/// `Unregister` is therefore modeled identically to a permanent `Disable`:
/// the system stays in place but is never again selected into a due set.
enum PendingSystemOp {
    Register(BoxedSystem, Vec<usize>),
    Enable(usize),
    Disable(usize),
    Unregister(usize),
}

pub struct FrameOrchestrator {
    world: World,
    commands: CommandBuffer,
    events: EventBus,
    systems: Vec<BoxedSystem>,
    explicit_after: Vec<Vec<usize>>,
    enabled: Vec<bool>,
    pending_ops: Vec<PendingSystemOp>,
    graph: Option<DependencyGraph>,
    excluded_by_cycle: Vec<usize>,
    cache: BatchCache,
    config: TickConfig,
    tick_counter: u64,
    last_diagnostics: TickDiagnostics,
    stats: SystemStatsTable,
    /// Dedicated worker pool sized per `config.parallel_worker_count`; `None`
    /// means "run batches on rayon's global pool", matching `0`'s documented
    /// meaning on that field.
    worker_pool: Option<rayon::ThreadPool>,
    seconds_since_autosave: f64,
}

impl FrameOrchestrator {
    pub fn new(world: World, config: TickConfig) -> Self {
        let worker_pool = (config.parallel_worker_count > 0)
            .then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.parallel_worker_count)
                    .build()
                    .expect("building a rayon thread pool with a fixed thread count does not fail")
            });
        Self {
            world,
            commands: CommandBuffer::with_capacity(config.default_command_bucket_capacity),
            events: EventBus::new(),
            systems: Vec::new(),
            explicit_after: Vec::new(),
            enabled: Vec::new(),
            pending_ops: Vec::new(),
            graph: None,
            excluded_by_cycle: Vec::new(),
            cache: BatchCache::new(),
            config,
            tick_counter: 0,
            last_diagnostics: TickDiagnostics::new(),
            stats: SystemStatsTable::new(),
            worker_pool,
            seconds_since_autosave: 0.0,
        }
    }

    /// Whether `config.autosave_interval_seconds` worth of simulated time has
    /// elapsed since the last time this returned `true`. The core has no
    /// save format of its own (see `SPEC_FULL.md` §6); a host wires this to
    /// its own persistence call and the orchestrator doesn't track whether
    /// that call actually happened, only whether the interval has elapsed
    /// since the question was last asked.
    pub fn due_for_autosave(&mut self) -> bool {
        if self.config.autosave_interval_seconds <= 0.0 {
            return false;
        }
        self.seconds_since_autosave += self.config.fixed_dt;
        if self.seconds_since_autosave >= self.config.autosave_interval_seconds {
            self.seconds_since_autosave = 0.0;
            true
        } else {
            false
        }
    }

    /// Save every registered system's state via `profile`, keyed by
    /// `System::name`. Not part of the tick loop — a host calls this at
    /// whatever cadence it wants (see `due_for_autosave`), and the core has
    /// no opinion on how `profile` encodes what it's handed.
    pub fn save_all(&self, profile: &mut dyn SaveProfile) {
        self.events.publish(WorldSave);
        for system in &self.systems {
            system.save_state(profile.writer(system.name()));
        }
        self.events.publish(WorldSaved);
    }

    /// Restore every registered system's state via `profile`, keyed by
    /// `System::name`, in the same order `save_all` wrote it.
    pub fn load_all(&mut self, profile: &mut dyn LoadProfile) {
        self.events.publish(WorldLoad);
        for system in &mut self.systems {
            system.load_state(profile.reader(system.name()));
        }
        self.events.publish(WorldLoaded);
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Computed, never accumulated, to avoid float drift across long runs.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }

    /// Cross-tick last/average/peak timing for the system at `index`, if it
    /// has run at least once and its `stats_enabled()` permitted recording.
    pub fn system_stats(&self, index: usize) -> Option<SystemStats> {
        self.stats.get(index)
    }

    pub fn add_system(&mut self, system: impl System + 'static) -> usize {
        self.add_system_after(system, &[])
    }

    /// Register a system that must run only after every system index in
    /// `after` has completed, regardless of whether their accesses conflict.
    /// Takes effect immediately (for setup before the first tick); to
    /// register a system from within a running tick, use
    /// [`FrameOrchestrator::queue_register_system`] instead.
    pub fn add_system_after(&mut self, system: impl System + 'static, after: &[usize]) -> usize {
        let index = self.systems.len();
        self.systems.push(Box::new(system));
        self.explicit_after.push(after.to_vec());
        self.enabled.push(true);
        self.graph = None;
        self.cache.invalidate();
        index
    }

    /// Queue a new system for registration at the next tick's phase 2.
    /// Returns nothing, since the system's eventual index isn't known until
    /// the queue drains.
    pub fn queue_register_system(&mut self, system: impl System + 'static, after: &[usize]) {
        self.pending_ops.push(PendingSystemOp::Register(Box::new(system), after.to_vec()));
    }

    pub fn queue_enable_system(&mut self, index: usize) {
        self.pending_ops.push(PendingSystemOp::Enable(index));
    }

    pub fn queue_disable_system(&mut self, index: usize) {
        self.pending_ops.push(PendingSystemOp::Disable(index));
    }

    pub fn queue_unregister_system(&mut self, index: usize) {
        self.pending_ops.push(PendingSystemOp::Unregister(index));
    }

    /// Phase 2: resolve queued register/enable/disable/unregister requests.
    /// Runs before the entity-structural phases so a system registered this
    /// tick observes this same tick's `EntityBatchCreated`/`EntityBatchDestroyed`.
    fn drain_system_registration_queue(&mut self) {
        if self.pending_ops.is_empty() {
            return;
        }
        for op in std::mem::take(&mut self.pending_ops) {
            match op {
                PendingSystemOp::Register(system, after) => {
                    self.systems.push(system);
                    self.explicit_after.push(after);
                    self.enabled.push(true);
                }
                PendingSystemOp::Enable(index) => {
                    if let Some(flag) = self.enabled.get_mut(index) {
                        if !*flag {
                            *flag = true;
                            self.systems[index].on_enable();
                        }
                    }
                }
                PendingSystemOp::Disable(index) | PendingSystemOp::Unregister(index) => {
                    if let Some(flag) = self.enabled.get_mut(index) {
                        if *flag {
                            *flag = false;
                            self.systems[index].on_disable();
                        }
                    }
                }
            }
        }
        self.graph = None;
        self.cache.invalidate();
    }

    /// Never fails: a cycle among the registered systems leaves the involved
    /// systems excluded from every batch (see `excluded_by_cycle`) rather
    /// than aborting graph construction.
    fn ensure_graph(&mut self) {
        if self.graph.is_some() {
            return;
        }
        let accesses: Vec<_> = self.systems.iter().map(|s| s.access()).collect();
        let (graph, excluded) = DependencyGraph::build_tolerant(&accesses, &self.explicit_after);
        if !excluded.is_empty() {
            tracing::error!(?excluded, "circular dependency detected; these systems will not run until it is broken");
        }
        self.excluded_by_cycle = excluded;
        self.graph = Some(graph);
        self.cache.invalidate();
    }

    /// Run one fixed-timestep tick through all eight phases.
    pub fn tick(&mut self) {
        let tick_span = tracing::debug_span!("tick", tick = self.tick_counter);
        let _tick_span = tick_span.enter();

        let start = Instant::now();
        let mut diagnostics = TickDiagnostics::new();

        // Phase 1: advance time. `tick_counter` hasn't incremented yet, so
        // `sim_time()` here still reports the *start* of this frame.
        {
            let _phase = tracing::debug_span!("phase", name = "advance_time").entered();
            let _ = self.sim_time();
        }

        // Phase 2: system structural queue.
        {
            let _phase = tracing::debug_span!("phase", name = "registration_queue").entered();
            self.drain_system_registration_queue();
        }

        // Phase 3: drain the command buffer. Creates and destroys from
        // systems that ran last tick (or direct World callers) are applied
        // to archetypes inside `apply_pending`, destroys before creates;
        // add/remove ops are queued onto `World`'s pending queues rather than
        // applied here.
        //
        // Destroys are drained in two steps so `EntityBatchDestroyRequest`
        // can be published while the entities are still fully alive — their
        // components are only tombstoned by the `apply_pending` call that
        // follows.
        {
            let _phase = tracing::debug_span!("phase", name = "command_apply").entered();
            let apply_start = Instant::now();
            let pending = self.commands.drain_pending();
            if !pending.pending_destroys().is_empty() {
                self.events.publish(EntityBatchDestroyRequest {
                    entities: pending.pending_destroys().to_vec(),
                });
            }
            let report = self.commands.apply_pending(pending, &mut self.world);
            diagnostics.command_apply_time = apply_start.elapsed();
            if !report.destroyed.is_empty() {
                self.events.publish(EntityBatchDestroyed {
                    entities: report.destroyed,
                });
            }
            if !report.created.is_empty() {
                self.events.publish(EntityBatchCreated { entities: report.created });
            }
        }

        // Phase 4: component add/remove, queued by this tick's drain above
        // or by a prior tick's systems. Removes drain fully before adds, FIFO
        // within each, so a stale add against a recycled entity index is
        // dropped rather than landing on the wrong entity.
        {
            let _phase = tracing::debug_span!("phase", name = "component_ops").entered();
            self.world.apply_pending_component_ops();
        }

        // Phase 5: structural validation. `debug_assert!` in debug builds;
        // in release builds the check still runs (cheaply, once per tick)
        // but a violation is logged rather than panicking, per the
        // InvariantViolation policy.
        if self.config.validate_every_tick {
            let _phase = tracing::debug_span!("phase", name = "validate").entered();
            if cfg!(debug_assertions) {
                debug_assert!(self.world.debug_validate(), "archetype column/entity-count mismatch");
            } else if !self.world.debug_validate() {
                tracing::error!("archetype column/entity-count mismatch");
            }
        }

        // Phase 6: run this tick's due, enabled systems in dependency/conflict batches.
        {
            let _phase = tracing::debug_span!("phase", name = "run_systems").entered();
            self.ensure_graph();
            let due: Vec<usize> = self
                .systems
                .iter()
                .enumerate()
                .filter(|&(i, s)| {
                    self.enabled[i]
                        && !self.excluded_by_cycle.contains(&i)
                        && s.tick_rate().is_due(self.tick_counter, self.config.fixed_dt)
                })
                .map(|(i, _)| i)
                .collect();
            let graph = self.graph.as_ref().expect("ensure_graph just built it");
            let batches = self.cache.active_batches(graph, &due).to_vec();
            for (batch_index, batch) in batches.iter().enumerate() {
                let _batch_span = tracing::debug_span!("batch", batch_index, systems = batch.system_indices.len()).entered();
                let outcomes = match &self.worker_pool {
                    Some(pool) => pool.install(|| crate::parallel::execute_batch(batch, &mut self.systems, &mut self.world, &self.commands)),
                    None => crate::parallel::execute_batch(batch, &mut self.systems, &mut self.world, &self.commands),
                };
                for outcome in outcomes {
                    let system = &self.systems[outcome.system_index];
                    diagnostics.record_system(system.name(), outcome.elapsed);
                    if system.stats_enabled() {
                        self.stats.record(outcome.system_index, outcome.elapsed);
                    }
                }
            }
        }

        // Phase 7: post-frame events become readable. Nothing is cleared
        // here — callers drain `events()` at their own pace between ticks.
        self.events.publish(WorldSystemsUpdated);

        // Phase 8: advance the tick counter.
        self.tick_counter += 1;

        diagnostics.total_time = start.elapsed();
        self.last_diagnostics = diagnostics;
    }

    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Force an immediate compaction pass across every archetype, outside
    /// the normal tick cadence. Left as an explicit call rather than an
    /// automatic threshold since the right pending-compaction cutoff is
    /// workload-specific.
    pub fn compact_now(&mut self) {
        let compaction_start = Instant::now();
        self.world.compact();
        self.last_diagnostics.compaction_time = compaction_start.elapsed();
    }
}
