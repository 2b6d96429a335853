//! Post-frame event bus.
//!
//! The orchestrator publishes a fixed set of batch-level lifecycle events at
//! the structural-phase boundaries defined by its tick loop (see
//! [`EntityBatchCreated`], [`EntityBatchDestroyRequest`],
//! [`EntityBatchDestroyed`], [`WorldSystemsUpdated`] below). Beyond that,
//! no finer-grained structural events (e.g. one per individual entity move)
//! are emitted automatically — a system that wants that observes the batch
//! payload directly or publishes its own domain event. What this module
//! provides is the generic, type-erased channel both the built-in events and
//! any system-defined event ride on: one `Vec<E>` per event type, keyed by
//! `TypeId`, following the same `TypeId`-keyed registration idiom as
//! `ecs_core::registry`.

use std::any::{Any, TypeId};
use std::sync::Mutex;

use ecs_core::prelude::Entity;
use rustc_hash::FxHashMap;

/// Fired once per tick after the structural phase's creation step, carrying
/// every entity created that tick (main-thread and worker-bucket creates
/// combined).
#[derive(Debug, Clone, Default)]
pub struct EntityBatchCreated {
    pub entities: Vec<Entity>,
}

/// Fired immediately before a tick's queued destroys are applied — the
/// listed entities are still fully alive, components intact, at the moment a
/// subscriber observes this event. [`EntityBatchDestroyed`] fires afterward,
/// once the same batch has actually been tombstoned.
#[derive(Debug, Clone, Default)]
pub struct EntityBatchDestroyRequest {
    pub entities: Vec<Entity>,
}

/// Fired once per tick after a tick's queued destroys have been applied.
#[derive(Debug, Clone, Default)]
pub struct EntityBatchDestroyed {
    pub entities: Vec<Entity>,
}

/// Fired once per tick after the system-execution phase completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldSystemsUpdated;

/// Fired by `FrameOrchestrator::save_all` before any system's `save_state`
/// runs. Persistence is not part of the tick loop; these four events mark a
/// save/load boundary a host triggers explicitly, not a tick phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldSave;

/// Fired after every system's `save_state` has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldSaved;

/// Fired by `FrameOrchestrator::load_all` before any system's `load_state`
/// runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldLoad;

/// Fired after every system's `load_state` has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorldLoaded;

/// A queue of typed events, published during a tick and drained by the
/// orchestrator's post-frame phase.
pub struct EventBus {
    queues: Mutex<FxHashMap<TypeId, Box<dyn Any + Send>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn publish<E: Send + 'static>(&self, event: E) {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Vec::<E>::new()));
        queue.downcast_mut::<Vec<E>>().expect("TypeId keys this entry to E").push(event);
    }

    /// Drain every queued `E`, in publish order, removing them from the bus.
    pub fn drain<E: Send + 'static>(&self) -> Vec<E> {
        let mut queues = self.queues.lock().unwrap();
        match queues.get_mut(&TypeId::of::<E>()) {
            Some(queue) => std::mem::take(queue.downcast_mut::<Vec<E>>().expect("TypeId keys this entry to E")),
            None => Vec::new(),
        }
    }

    /// Drop every queued event of every type. Called once per tick after the
    /// post-frame phase so events never silently leak into the next frame.
    pub fn clear_all(&self) {
        self.queues.lock().unwrap().clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct DamageDealt {
        amount: u32,
    }

    #[derive(Debug, PartialEq)]
    struct SoundPlayed {
        id: u32,
    }

    #[test]
    fn publish_then_drain_preserves_order() {
        let bus = EventBus::new();
        bus.publish(DamageDealt { amount: 1 });
        bus.publish(DamageDealt { amount: 2 });
        let drained = bus.drain::<DamageDealt>();
        assert_eq!(drained, vec![DamageDealt { amount: 1 }, DamageDealt { amount: 2 }]);
    }

    #[test]
    fn drain_empties_the_queue() {
        let bus = EventBus::new();
        bus.publish(DamageDealt { amount: 1 });
        let _ = bus.drain::<DamageDealt>();
        assert!(bus.drain::<DamageDealt>().is_empty());
    }

    #[test]
    fn distinct_event_types_do_not_interfere() {
        let bus = EventBus::new();
        bus.publish(DamageDealt { amount: 9 });
        bus.publish(SoundPlayed { id: 3 });
        assert_eq!(bus.drain::<SoundPlayed>(), vec![SoundPlayed { id: 3 }]);
        assert_eq!(bus.drain::<DamageDealt>(), vec![DamageDealt { amount: 9 }]);
    }

    #[test]
    fn clear_all_drops_unread_events() {
        let bus = EventBus::new();
        bus.publish(DamageDealt { amount: 5 });
        bus.clear_all();
        assert!(bus.drain::<DamageDealt>().is_empty());
    }

    #[test]
    fn built_in_lifecycle_events_ride_the_same_channel() {
        let bus = EventBus::new();
        bus.publish(EntityBatchCreated {
            entities: vec![Entity::new(1, 1), Entity::new(2, 1)],
        });
        let drained = bus.drain::<EntityBatchCreated>();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].entities.len(), 2);
    }
}
