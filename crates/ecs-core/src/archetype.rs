//! An [`Archetype`] is the Structure-of-Arrays storage for every entity that
//! shares one [`ComponentSignature`].
//!
//! Removal is **deferred compaction**, not swap-remove: [`Archetype::remove_at_swap`]
//! tombstones the slot in place (writes [`Entity::DEAD`] into `entities` and
//! records the slot in `dead_slots`) without touching any column. Columns and
//! the slot-to-entity mapping only get defragmented when [`Archetype::compact`]
//! is explicitly invoked, which is what lets a single mass-destroy of many
//! entities in one archetype cost one pass over `dead_slots` rather than one
//! swap-remove per entity touching arbitrarily many unrelated slots.

use rustc_hash::FxHashMap;

use crate::column::AnyColumn;
use crate::entity::Entity;
use crate::error::EcsError;
use crate::registry::ComponentTypeId;
use crate::signature::ComponentSignature;

/// One archetype: a signature, its columns (one per component type in the
/// signature, in registration order), and the entities occupying its slots.
pub struct Archetype {
    signature: ComponentSignature,
    columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)>,
    column_index: FxHashMap<ComponentTypeId, usize>,
    entities: Vec<Entity>,
    /// Number of live (non-tombstoned) slots. Tombstoned slots may still
    /// exist beyond this boundary inside `entities`/columns until `compact`
    /// runs — `live_count` is *not* `entities.len() - dead_slots.len()`
    /// rearranged into a contiguous prefix; it is simply the count, tracked
    /// so callers can cheaply report occupancy without scanning.
    live_count: usize,
    dead_slots: Vec<usize>,
}

impl Archetype {
    pub fn new(signature: ComponentSignature, columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)>) -> Self {
        let column_index = columns
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        Self {
            signature,
            columns,
            column_index,
            entities: Vec::new(),
            live_count: 0,
            dead_slots: Vec::new(),
        }
    }

    pub fn signature(&self) -> &ComponentSignature {
        &self.signature
    }

    /// Number of live entities (excludes tombstoned slots awaiting compaction).
    pub fn count(&self) -> usize {
        self.live_count
    }

    /// Total slots including tombstones not yet compacted away.
    pub fn raw_len(&self) -> usize {
        self.entities.len()
    }

    pub fn pending_compaction(&self) -> usize {
        self.dead_slots.len()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_at(&self, slot: usize) -> Entity {
        self.entities[slot]
    }

    /// True iff every column's length matches the entity vector's length.
    /// Cheap enough to run every tick in debug builds; never called in
    /// release configurations.
    pub fn debug_validate(&self) -> bool {
        self.columns.iter().all(|(_, column)| column.len() == self.entities.len())
    }

    fn column_for(&self, id: ComponentTypeId) -> Option<&dyn AnyColumn> {
        self.column_index.get(&id).map(|&i| self.columns[i].1.as_ref())
    }

    fn column_for_mut(&mut self, id: ComponentTypeId) -> Option<&mut Box<dyn AnyColumn>> {
        if let Some(&i) = self.column_index.get(&id) {
            Some(&mut self.columns[i].1)
        } else {
            None
        }
    }

    pub fn column<T: 'static>(&self, id: ComponentTypeId) -> Option<&crate::column::ColumnStore<T>> {
        self.column_for(id)?.as_any().downcast_ref()
    }

    pub fn column_mut<T: 'static>(&mut self, id: ComponentTypeId) -> Option<&mut crate::column::ColumnStore<T>> {
        self.column_for_mut(id)?.as_any_mut().downcast_mut()
    }

    /// Append a new slot for `entity`, pushing a default value onto every
    /// column. Returns the slot index.
    pub fn allocate_slot(&mut self, entity: Entity) -> usize {
        let slot = self.entities.len();
        self.entities.push(entity);
        for (_, column) in &mut self.columns {
            column.push_default();
        }
        self.live_count += 1;
        slot
    }

    /// Overwrite the entity handle recorded at `slot`. Used right after
    /// `allocate_slot`, which needs a placeholder handle before the real one
    /// (freshly assigned by the entity manager) exists.
    pub fn overwrite_entity_at(&mut self, slot: usize, entity: Entity) {
        self.entities[slot] = entity;
    }

    /// For every component type `self` and `other` both carry, copy the
    /// value at `other`'s `src_slot` into `self`'s `dst_slot`. Used when
    /// moving an entity between archetypes on an add/remove transition.
    pub fn copy_shared_components_from(&mut self, other: &Archetype, src_slot: usize, dst_slot: usize) {
        for (id, column) in &mut self.columns {
            if let Some(src_column) = other.column_for(*id) {
                src_column.copy_slot_into(src_slot, column.as_mut(), dst_slot);
            }
        }
    }

    pub fn set_component_boxed(
        &mut self,
        id: ComponentTypeId,
        slot: usize,
        value: Box<dyn std::any::Any + Send>,
    ) -> Result<(), EcsError> {
        let column = self.column_for_mut(id).ok_or(EcsError::UnknownComponent { id })?;
        column.set_boxed(slot, value);
        Ok(())
    }

    /// Tombstone `slot`: write [`Entity::DEAD`] and record it for later
    /// compaction. Does **not** touch columns and does **not** shrink
    /// `entities` — `raw_len()` is unchanged, only `count()` drops.
    ///
    /// Silently a no-op if `slot` is out of range or already tombstoned —
    /// required so a mass-destroy batch that references the same slot twice
    /// (or a slot beyond the live range) never races with itself.
    pub fn remove_at_swap(&mut self, slot: usize) {
        let Some(&entity) = self.entities.get(slot) else { return };
        if entity == Entity::DEAD {
            return;
        }
        self.entities[slot] = Entity::DEAD;
        self.dead_slots.push(slot);
        self.live_count -= 1;
    }

    /// Defragment: for every tombstoned slot, swap a live slot from the tail
    /// into it (calling `on_move(old_slot, new_slot, entity)` so the caller
    /// can update its slot lookup table), then truncate away the now-dead
    /// tail. Slots already empty (no live entities left at all) truncate to
    /// zero directly.
    ///
    /// `dead_slots` is processed in the order tombstones were recorded; this
    /// does not affect correctness, only which specific live entity ends up
    /// filling which freed slot.
    pub fn compact(&mut self, mut on_move: impl FnMut(usize, usize, Entity)) {
        if self.dead_slots.is_empty() {
            return;
        }

        let mut dead_slots = std::mem::take(&mut self.dead_slots);
        dead_slots.sort_unstable();

        let mut end = self.entities.len();
        for &dead_slot in &dead_slots {
            if dead_slot >= end {
                // Already swapped into from a later dead slot's displacement,
                // or beyond the surviving tail entirely.
                continue;
            }
            end -= 1;
            while end > dead_slot && self.entities[end] == Entity::DEAD {
                end -= 1;
            }
            if end <= dead_slot {
                // Everything from dead_slot onward is dead; nothing to move in.
                break;
            }
            let moved_entity = self.entities[end];
            self.entities[dead_slot] = moved_entity;
            self.entities[end] = Entity::DEAD;
            for (_, column) in &mut self.columns {
                column.swap_internal(dead_slot, end);
            }
            on_move(end, dead_slot, moved_entity);
        }

        let new_len = self.live_count;
        self.entities.truncate(new_len);
        for (_, column) in &mut self.columns {
            column.truncate(new_len);
        }
    }
}
