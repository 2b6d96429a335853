//! [`World`] ties the registry, archetype index, and entity manager together
//! and exposes the phase-level operations [`crate::orchestrator`]-equivalent
//! callers drive a tick through (here, the orchestrator itself lives in the
//! sibling `ecs-scheduler` crate; `World` only exposes the primitives).
//!
//! Component add/remove requests are **not** applied synchronously — even a
//! direct `World::queue_add_component` call only enqueues. They are applied,
//! in a fixed remove-then-add order, by [`World::apply_pending_component_ops`],
//! which a frame orchestrator calls once per tick. This is what makes the
//! recycle-safety invariant hold: an add queued against an entity that gets
//! destroyed and whose index is recycled before the queue drains is silently
//! dropped rather than landing on the wrong, newer entity.

use std::any::Any;
use std::collections::VecDeque;

use crate::archetype_index::{ArchetypeId, ArchetypeIndex};
use crate::command::CreateRecord;
use crate::entity::Entity;
use crate::error::EcsError;
use crate::manager::EntityManager;
use crate::registry::{ComponentTypeId, ComponentTypeRegistry};
use crate::signature::ComponentSignature;

pub struct World {
    registry: ComponentTypeRegistry,
    archetypes: ArchetypeIndex,
    entities: EntityManager,
    empty_archetype: ArchetypeId,
    pending_add_queue: VecDeque<(Entity, ComponentTypeId, Box<dyn Any + Send>)>,
    pending_remove_queue: VecDeque<(Entity, ComponentTypeId)>,
}

impl World {
    pub fn new(registry: ComponentTypeRegistry) -> Self {
        let mut archetypes = ArchetypeIndex::new();
        let empty_archetype = archetypes
            .get_or_create(ComponentSignature::empty(), &registry)
            .expect("the empty signature never fails to resolve");
        Self {
            registry,
            archetypes,
            entities: EntityManager::new(),
            empty_archetype,
            pending_add_queue: VecDeque::new(),
            pending_remove_queue: VecDeque::new(),
        }
    }

    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    pub fn archetypes(&self) -> &ArchetypeIndex {
        &self.archetypes
    }

    pub fn entities(&self) -> &EntityManager {
        &self.entities
    }

    /// Crate-internal escape hatch for `query`'s mutable fetch, which needs
    /// to reach a column through an `&World` it has cast from `*const` to
    /// `*mut` — see that module's safety argument.
    pub(crate) fn archetypes_mut(&mut self) -> &mut ArchetypeIndex {
        &mut self.archetypes
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    /// Spawn an entity with no components, placed directly in the empty
    /// archetype. Used by tests and by systems that build entities up via
    /// subsequent `queue_add_component` calls rather than a `CommandBuffer`
    /// builder.
    pub fn spawn_empty(&mut self) -> Entity {
        let slot = self.archetypes.get_mut(self.empty_archetype).allocate_slot(Entity::INVALID);
        let entity = self.entities.create(self.empty_archetype, slot);
        // allocate_slot needed a placeholder entity before the real handle
        // existed; patch the archetype's stored handle now that we have it.
        self.archetypes.get_mut(self.empty_archetype).overwrite_entity_at(slot, entity);
        entity
    }

    /// Applied immediately by `CommandBuffer::apply` — not deferred further.
    pub fn spawn_from_record(&mut self, record: CreateRecord) -> Entity {
        let mut signature = ComponentSignature::empty();
        for (id, _) in &record.components {
            signature = signature.with(*id);
        }
        let archetype_id = self
            .archetypes
            .get_or_create(signature, &self.registry)
            .expect("component type ids in a CreateRecord are always already registered");
        let slot = self.archetypes.get_mut(archetype_id).allocate_slot(Entity::INVALID);
        let entity = self.entities.create(archetype_id, slot);
        let archetype = self.archetypes.get_mut(archetype_id);
        archetype.overwrite_entity_at(slot, entity);
        for (id, value) in record.components {
            archetype
                .set_component_boxed(id, slot, value)
                .expect("component type ids in a CreateRecord are always already registered");
        }
        entity
    }

    /// Applied immediately — tombstones the entity's archetype slot via
    /// deferred compaction and frees its index for recycling. Silently a
    /// no-op if `entity` is already dead (mass-destroy batches may contain
    /// duplicates or entities destroyed earlier in the same drain).
    pub fn destroy(&mut self, entity: Entity) {
        let Ok((archetype_id, slot)) = self.entities.location(entity) else {
            tracing::debug!(?entity, "destroy: entity already dead, ignoring");
            return;
        };
        self.archetypes.get_mut(archetype_id).remove_at_swap(slot);
        self.entities.destroy(entity).expect("checked alive above");
    }

    /// Defragment every archetype's tombstoned slots, updating the entity
    /// manager's location table for every entity that moved.
    pub fn compact(&mut self) {
        let mut moves = Vec::new();
        self.archetypes.compact_all(|archetype_id, _from, to, entity| {
            moves.push((entity, archetype_id, to));
        });
        for (entity, archetype_id, slot) in moves {
            self.entities.update_location(entity, archetype_id, slot);
        }
    }

    /// Checks that every archetype's columns are all the same length as its
    /// entity vector. Intended for a debug-only validation phase between the
    /// structural and component-op phases of a tick; never run in release
    /// builds.
    pub fn debug_validate(&self) -> bool {
        self.archetypes.all().all(|id| self.archetypes.get(id).debug_validate())
    }

    pub fn queue_add_component(&mut self, entity: Entity, id: ComponentTypeId, value: Box<dyn Any + Send>) {
        self.pending_add_queue.push_back((entity, id, value));
    }

    pub fn queue_remove_component(&mut self, entity: Entity, id: ComponentTypeId) {
        self.pending_remove_queue.push_back((entity, id));
    }

    /// Drains `pending_remove_queue` to empty, then `pending_add_queue` to
    /// empty, each in FIFO order. Entities that died (or whose component set
    /// no longer matches the queued op) between enqueue and drain are
    /// skipped with a `tracing::debug!`, not an error — a queued op against a
    /// since-recycled index is exactly the case this ordering exists to
    /// protect against.
    pub fn apply_pending_component_ops(&mut self) {
        while let Some((entity, id)) = self.pending_remove_queue.pop_front() {
            if let Err(err) = self.remove_component_now(entity, id) {
                tracing::debug!(?entity, ?id, %err, "skipping stale component removal");
            }
        }
        while let Some((entity, id, value)) = self.pending_add_queue.pop_front() {
            if let Err(err) = self.add_component_now(entity, id, value) {
                tracing::debug!(?entity, ?id, %err, "skipping stale component add");
            }
        }
    }

    fn add_component_now(&mut self, entity: Entity, id: ComponentTypeId, value: Box<dyn Any + Send>) -> Result<(), EcsError> {
        let (from, old_slot) = self.entities.location(entity)?;
        if self.archetypes.signature_of(from).contains(id) {
            // DuplicateComponent: no-op with warning, the entity keeps its
            // existing value rather than being overwritten.
            tracing::warn!(?entity, ?id, "add_component: entity already has this component, ignoring");
            return Ok(());
        }
        let target = self.archetypes.transition_add(from, id, &self.registry)?;
        let new_slot = self.move_entity(entity, from, old_slot, target);
        self.archetypes.get_mut(target).set_component_boxed(id, new_slot, value)
    }

    fn remove_component_now(&mut self, entity: Entity, id: ComponentTypeId) -> Result<(), EcsError> {
        let (from, old_slot) = self.entities.location(entity)?;
        if !self.archetypes.signature_of(from).contains(id) {
            return Err(EcsError::ComponentMissing { entity, id });
        }
        let target = self.archetypes.transition_remove(from, id, &self.registry)?;
        self.move_entity(entity, from, old_slot, target);
        Ok(())
    }

    /// Move `entity` from `(from, old_slot)` to a freshly allocated slot in
    /// `target`, copying every component both archetypes share, tombstoning
    /// the old slot, and updating the entity manager's location. Returns the
    /// new slot.
    fn move_entity(&mut self, entity: Entity, from: ArchetypeId, old_slot: usize, target: ArchetypeId) -> usize {
        let (from_arch, target_arch) = self.archetypes.get_pair_mut(from, target);
        let new_slot = target_arch.allocate_slot(entity);
        target_arch.copy_shared_components_from(from_arch, old_slot, new_slot);
        from_arch.remove_at_swap(old_slot);
        self.entities.update_location(entity, target, new_slot);
        new_slot
    }
}
