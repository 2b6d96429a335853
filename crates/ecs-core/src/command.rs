//! Deferred structural mutation.
//!
//! Systems never touch archetypes directly — they queue creates, destroys,
//! and component add/remove operations against a shared [`CommandBuffer`]
//! while running, and those operations are only applied by [`World`] at
//! well-defined points in the frame (see `orchestrator::FrameOrchestrator`).
//!
//! Two bucket types exist per buffer: the `main` [`MainBucket`], used
//! directly from the orchestrator thread, and a pool of per-worker
//! [`WorkerBucket`]s checked out via [`CommandBuffer::checkout`] so that
//! parallel systems never contend on a single lock for every single queued
//! op. Entity creation is main-thread only — `WorkerBucket` carries no
//! `creates` field at all, so a worker reaching for it is a compile error,
//! not a convention a caller has to remember. A bucket returns to the pool
//! automatically when its [`BucketHandle`] is dropped.
//!
//! Component add/remove ops are **not** applied by [`CommandBuffer::apply`]:
//! they are moved onto [`World`]'s persistent pending queues, which survive
//! across a tick boundary and are drained by the orchestrator's component
//! phase — see that module for why this is required for recycle-safety.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crossbeam::queue::SegQueue;

use crate::entity::Entity;
use crate::registry::ComponentTypeId;
use crate::world::World;

/// What a single [`CommandBuffer::apply`] call actually did to `world`, so a
/// caller (the frame orchestrator) can fire its own batch-level lifecycle
/// events without re-deriving the list by diffing `World` before and after.
#[derive(Debug, Default, Clone)]
pub struct ApplyReport {
    pub created: Vec<Entity>,
    pub destroyed: Vec<Entity>,
}

/// A deferred entity creation: the set of components it will be given once
/// applied, each already boxed and tagged with its registered type id.
pub struct CreateRecord {
    pub components: Vec<(ComponentTypeId, Box<dyn Any + Send>)>,
}

/// Every operation drained out of every bucket for one tick, not yet applied
/// to a `World`. See [`CommandBuffer::drain_pending`].
#[derive(Default)]
pub struct PendingOps {
    creates: Vec<CreateRecord>,
    destroys: Vec<Entity>,
    adds: Vec<(Entity, ComponentTypeId, Box<dyn Any + Send>)>,
    removes: Vec<(Entity, ComponentTypeId)>,
}

impl PendingOps {
    /// Entities about to be destroyed. Still fully valid — components intact
    /// — until this `PendingOps` is passed to `CommandBuffer::apply_pending`.
    pub fn pending_destroys(&self) -> &[Entity] {
        &self.destroys
    }
}

/// A worker thread's private batch of queued operations. No `creates` field:
/// entity creation is restricted to the main-thread API (see
/// [`CommandBuffer::create`]) — a worker never gets the chance to queue one.
#[derive(Default)]
struct WorkerBucket {
    destroys: Vec<Entity>,
    adds: Vec<(Entity, ComponentTypeId, Box<dyn Any + Send>)>,
    removes: Vec<(Entity, ComponentTypeId)>,
}

impl WorkerBucket {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            destroys: Vec::with_capacity(capacity),
            adds: Vec::with_capacity(capacity),
            removes: Vec::with_capacity(capacity),
        }
    }

    fn is_empty(&self) -> bool {
        self.destroys.is_empty() && self.adds.is_empty() && self.removes.is_empty()
    }

    /// The longest of this bucket's three queues, the dimension a soft cap is
    /// measured against.
    fn peak_len(&self) -> usize {
        self.destroys.len().max(self.adds.len()).max(self.removes.len())
    }
}

/// The main thread's private batch of queued operations. Everything a
/// [`WorkerBucket`] can queue, plus `creates`.
#[derive(Default)]
struct MainBucket {
    creates: Vec<CreateRecord>,
    destroys: Vec<Entity>,
    adds: Vec<(Entity, ComponentTypeId, Box<dyn Any + Send>)>,
    removes: Vec<(Entity, ComponentTypeId)>,
}

impl MainBucket {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            creates: Vec::with_capacity(capacity),
            destroys: Vec::with_capacity(capacity),
            adds: Vec::with_capacity(capacity),
            removes: Vec::with_capacity(capacity),
        }
    }

    fn peak_len(&self) -> usize {
        self.creates
            .len()
            .max(self.destroys.len())
            .max(self.adds.len())
            .max(self.removes.len())
    }
}

/// Builder for a single deferred entity creation, returned by
/// [`CommandBuffer::create`]. Main-thread only — there is no worker-facing
/// equivalent.
pub struct EntityBuilder<'a> {
    components: Vec<(ComponentTypeId, Box<dyn Any + Send>)>,
    buffer: &'a CommandBuffer,
}

impl<'a> EntityBuilder<'a> {
    pub fn with<T: Send + 'static>(mut self, id: ComponentTypeId, value: T) -> Self {
        self.components.push((id, Box::new(value)));
        self
    }

    /// Finalize the builder, queuing the create. Takes effect the next time
    /// [`CommandBuffer::apply`] runs.
    pub fn spawn(self) {
        let record = CreateRecord {
            components: self.components,
        };
        self.buffer.main.lock().unwrap().creates.push(record);
    }
}

/// An exclusive, checked-out per-worker command bucket. Returns itself to the
/// owning [`CommandBuffer`]'s filled queue on drop, ready for the next
/// `apply()` to pick up — the worker never blocks waiting for `apply()`.
///
/// Deliberately has no `create`: entity creation is main-thread only (§4.H's
/// worker API is `{add_component, remove_component, destroy_entity}`), and
/// this type simply doesn't expose the method rather than relying on a
/// caller not to use it.
pub struct BucketHandle<'a> {
    bucket: Option<WorkerBucket>,
    buffer: &'a CommandBuffer,
}

impl<'a> BucketHandle<'a> {
    pub fn destroy(&mut self, entity: Entity) {
        self.bucket.as_mut().expect("bucket taken").destroys.push(entity);
    }

    pub fn add_component<T: Send + 'static>(&mut self, entity: Entity, id: ComponentTypeId, value: T) {
        self.bucket
            .as_mut()
            .expect("bucket taken")
            .adds
            .push((entity, id, Box::new(value)));
    }

    pub fn remove_component(&mut self, entity: Entity, id: ComponentTypeId) {
        self.bucket.as_mut().expect("bucket taken").removes.push((entity, id));
    }
}

impl<'a> Drop for BucketHandle<'a> {
    fn drop(&mut self) {
        if let Some(bucket) = self.bucket.take() {
            if !bucket.is_empty() {
                self.buffer.filled.push(bucket);
            } else {
                self.buffer.pool.push(bucket);
            }
        }
    }
}

/// The world-wide command queue. Shared (`&CommandBuffer`, not `&mut`) across
/// every system in a parallel batch; every mutating path goes through a lock
/// scoped to a single bucket, never the whole buffer.
pub struct CommandBuffer {
    main: Mutex<MainBucket>,
    pool: SegQueue<WorkerBucket>,
    filled: SegQueue<WorkerBucket>,
    default_bucket_capacity: usize,
    /// Cleared at the start of every `apply()`; set the first time a bucket
    /// is found over its soft cap so the warning fires at most once per tick
    /// even when many buckets overflowed.
    overflow_warned: AtomicBool,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// `capacity` is reserved up front in every freshly allocated bucket
    /// (main and worker), avoiding reallocation under typical per-tick
    /// structural-op volume. `0` falls back to `Vec`'s default growth and
    /// disables the soft-cap overflow warning (there is no cap to compare
    /// against).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            main: Mutex::new(MainBucket::with_capacity(capacity)),
            pool: SegQueue::new(),
            filled: SegQueue::new(),
            default_bucket_capacity: capacity,
            overflow_warned: AtomicBool::new(false),
        }
    }

    pub fn create(&self) -> EntityBuilder<'_> {
        EntityBuilder {
            components: Vec::new(),
            buffer: self,
        }
    }

    pub fn destroy(&self, entity: Entity) {
        self.main.lock().unwrap().destroys.push(entity);
    }

    pub fn add_component<T: Send + 'static>(&self, entity: Entity, id: ComponentTypeId, value: T) {
        self.main.lock().unwrap().adds.push((entity, id, Box::new(value)));
    }

    pub fn remove_component(&self, entity: Entity, id: ComponentTypeId) {
        self.main.lock().unwrap().removes.push((entity, id));
    }

    /// Check out a private bucket for a worker thread, reusing a pooled one
    /// if available.
    pub fn checkout(&self) -> BucketHandle<'_> {
        let bucket = self.pool.pop().unwrap_or_else(|| WorkerBucket::with_capacity(self.default_bucket_capacity));
        BucketHandle {
            bucket: Some(bucket),
            buffer: self,
        }
    }

    /// Drain every bucket (main + every returned worker bucket) without
    /// touching `world` yet. Separated from `apply_pending` so a caller (the
    /// frame orchestrator) can inspect [`PendingOps::pending_destroys`] —
    /// and publish a batch-destroy request event while those entities'
    /// components are still valid — before the actual tombstoning happens.
    pub fn drain_pending(&self) -> PendingOps {
        self.overflow_warned.store(false, Ordering::Relaxed);
        let mut pending = PendingOps::default();

        let main = std::mem::take(&mut *self.main.lock().unwrap());
        self.check_overflow(main.peak_len());
        pending.creates = main.creates;
        pending.destroys = main.destroys;
        pending.adds = main.adds;
        pending.removes = main.removes;

        while let Some(bucket) = self.filled.pop() {
            self.check_overflow(bucket.peak_len());
            pending.destroys.extend(bucket.destroys);
            pending.adds.extend(bucket.adds);
            pending.removes.extend(bucket.removes);
            self.pool.push(WorkerBucket::with_capacity(self.default_bucket_capacity));
        }

        pending
    }

    /// Apply a previously drained [`PendingOps`] to `world`. Destroys apply
    /// before creates, matching the frame orchestrator's structural phase
    /// order; adds/removes are moved onto `world`'s persistent pending
    /// queues for the orchestrator's component phase to drain later.
    pub fn apply_pending(&self, pending: PendingOps, world: &mut World) -> ApplyReport {
        let mut report = ApplyReport::default();
        for entity in pending.destroys {
            if world.is_alive(entity) {
                report.destroyed.push(entity);
            }
            world.destroy(entity);
        }
        for record in pending.creates {
            report.created.push(world.spawn_from_record(record));
        }
        for (entity, id, value) in pending.adds {
            world.queue_add_component(entity, id, value);
        }
        for (entity, id) in pending.removes {
            world.queue_remove_component(entity, id);
        }
        report
    }

    /// Convenience composition of `drain_pending` + `apply_pending` for
    /// callers that don't need to observe pending destroys before they take
    /// effect (tests, one-shot tools). The frame orchestrator calls the two
    /// steps separately so it can fire `EntityBatchDestroyRequest` in
    /// between.
    pub fn apply(&self, world: &mut World) -> ApplyReport {
        let pending = self.drain_pending();
        self.apply_pending(pending, world)
    }

    /// A bucket growing past its configured capacity is not an error — the
    /// `Vec`s simply reallocate — but it means the caller under-sized
    /// `default_command_bucket_capacity` for this workload, worth a once-per-
    /// tick warning rather than silence.
    fn check_overflow(&self, peak_len: usize) {
        if self.default_bucket_capacity == 0 {
            return;
        }
        if peak_len > self.default_bucket_capacity
            && self.overflow_warned.compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed).is_ok()
        {
            tracing::warn!(
                capacity = self.default_bucket_capacity,
                peak = peak_len,
                "command bucket exceeded its configured capacity this tick; growing"
            );
        }
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}
