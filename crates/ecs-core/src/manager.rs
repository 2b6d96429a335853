//! Entity lifecycle: allocation, recycling, and the location lookup that maps
//! a live entity to its `(archetype, slot)`.
//!
//! Generalizes the teacher's `EntityAllocator` (`nomai-ecs/src/entity.rs`,
//! one `(generation, alive)` pair per index with a FIFO free list) to three
//! parallel arrays so the same index lookup also yields archetype location,
//! without a second hash map on the hot path.

use crate::archetype_index::ArchetypeId;
use crate::entity::Entity;
use crate::error::EcsError;

#[derive(Clone, Copy)]
struct Slot {
    version: u32,
    alive: bool,
    archetype: ArchetypeId,
    slot: usize,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            version: 0,
            alive: false,
            archetype: ArchetypeId(0),
            slot: 0,
        }
    }
}

/// Owns the generational version table and the free-index stack. Index `0`
/// is never allocated — `slots[0]` is padding so `Entity::index()` can be
/// used directly as an array index with no off-by-one.
pub struct EntityManager {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::default()], // index 0 reserved
            free: Vec::new(),
        }
    }

    /// Allocate a fresh entity, placed at `(archetype, slot)`. Reuses the
    /// lowest-index freed slot if one exists (FIFO), bumping its version.
    pub fn create(&mut self, archetype: ArchetypeId, slot: usize) -> Entity {
        if let Some(index) = self.free.pop() {
            let entry = &mut self.slots[index as usize];
            entry.alive = true;
            entry.archetype = archetype;
            entry.slot = slot;
            return Entity::new(index, entry.version);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            version: 1,
            alive: true,
            archetype,
            slot,
        });
        Entity::new(index, 1)
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.is_invalid() {
            return false;
        }
        self.slots
            .get(entity.index() as usize)
            .is_some_and(|s| s.alive && s.version == entity.version())
    }

    /// Mark `entity` dead, bump its version, and push its index onto the
    /// free list. Does not touch the archetype it was stored in — callers
    /// must call `remove_at_swap` on that archetype themselves.
    pub fn destroy(&mut self, entity: Entity) -> Result<(), EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        let index = entity.index();
        let slot = &mut self.slots[index as usize];
        slot.alive = false;
        slot.version = slot.version.wrapping_add(1).max(1);
        self.free.push(index);
        Ok(())
    }

    pub fn location(&self, entity: Entity) -> Result<(ArchetypeId, usize), EcsError> {
        if !self.is_alive(entity) {
            return Err(EcsError::InvalidEntity { entity });
        }
        let slot = &self.slots[entity.index() as usize];
        Ok((slot.archetype, slot.slot))
    }

    /// Update the recorded `(archetype, slot)` for a still-alive entity, used
    /// after an archetype transition or a compaction pass moves it.
    pub fn update_location(&mut self, entity: Entity, archetype: ArchetypeId, slot: usize) {
        debug_assert!(self.is_alive(entity));
        let s = &mut self.slots[entity.index() as usize];
        s.archetype = archetype;
        s.slot = slot;
    }

    pub fn alive_count(&self) -> usize {
        self.slots.len() - 1 - self.free.len()
    }
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch() -> ArchetypeId {
        ArchetypeId(0)
    }

    #[test]
    fn create_then_alive() {
        let mut mgr = EntityManager::new();
        let e = mgr.create(arch(), 0);
        assert!(mgr.is_alive(e));
        assert_eq!(mgr.location(e).unwrap(), (arch(), 0));
    }

    #[test]
    fn destroy_then_stale_handle_is_dead() {
        let mut mgr = EntityManager::new();
        let e = mgr.create(arch(), 0);
        mgr.destroy(e).unwrap();
        assert!(!mgr.is_alive(e));
        assert!(matches!(mgr.destroy(e), Err(EcsError::InvalidEntity { .. })));
    }

    #[test]
    fn recycled_index_gets_new_version() {
        let mut mgr = EntityManager::new();
        let e0 = mgr.create(arch(), 0);
        mgr.destroy(e0).unwrap();
        let e1 = mgr.create(arch(), 0);
        assert_eq!(e0.index(), e1.index());
        assert_ne!(e0.version(), e1.version());
        assert!(!mgr.is_alive(e0));
        assert!(mgr.is_alive(e1));
    }

    #[test]
    fn index_zero_is_never_allocated() {
        let mut mgr = EntityManager::new();
        let e = mgr.create(arch(), 0);
        assert_ne!(e.index(), 0);
    }

    #[test]
    fn alive_count_tracks_create_and_destroy() {
        let mut mgr = EntityManager::new();
        let a = mgr.create(arch(), 0);
        let _b = mgr.create(arch(), 1);
        assert_eq!(mgr.alive_count(), 2);
        mgr.destroy(a).unwrap();
        assert_eq!(mgr.alive_count(), 1);
    }

    #[test]
    fn update_location_moves_slot() {
        let mut mgr = EntityManager::new();
        let e = mgr.create(arch(), 0);
        mgr.update_location(e, ArchetypeId(1), 5);
        assert_eq!(mgr.location(e).unwrap(), (ArchetypeId(1), 5));
    }
}
