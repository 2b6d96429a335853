//! Resolves [`ComponentSignature`]s to live [`Archetype`]s and memoizes the
//! single-component-add/remove transition graph between them (an "archetype
//! graph", as in most archetypal ECS designs — grounded here on the edge-cache
//! idea in `saptak7777-Archetype-ECS`'s `schedule.rs`, generalized from
//! systems to archetypes).

use rustc_hash::FxHashMap;

use crate::archetype::Archetype;
use crate::column::AnyColumn;
use crate::error::EcsError;
use crate::registry::{ComponentTypeId, ComponentTypeRegistry};
use crate::signature::ComponentSignature;

/// Opaque handle to one archetype inside an [`ArchetypeIndex`]. Stable for
/// the lifetime of the archetype (archetypes are never removed once created,
/// only emptied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchetypeId(pub usize);

#[derive(Default)]
struct Edges {
    add: FxHashMap<ComponentTypeId, ArchetypeId>,
    remove: FxHashMap<ComponentTypeId, ArchetypeId>,
}

pub struct ArchetypeIndex {
    archetypes: Vec<Archetype>,
    by_signature: FxHashMap<ComponentSignature, ArchetypeId>,
    edges: Vec<Edges>,
}

impl ArchetypeIndex {
    pub fn new() -> Self {
        Self {
            archetypes: Vec::new(),
            by_signature: FxHashMap::default(),
            edges: Vec::new(),
        }
    }

    pub fn get(&self, id: ArchetypeId) -> &Archetype {
        &self.archetypes[id.0]
    }

    pub fn get_mut(&mut self, id: ArchetypeId) -> &mut Archetype {
        &mut self.archetypes[id.0]
    }

    /// Two mutable borrows into distinct archetypes at once, needed by
    /// transitions that copy components from one archetype into another.
    pub fn get_pair_mut(&mut self, a: ArchetypeId, b: ArchetypeId) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a.0, b.0, "get_pair_mut: same archetype twice");
        if a.0 < b.0 {
            let (left, right) = self.archetypes.split_at_mut(b.0);
            (&mut left[a.0], &mut right[0])
        } else {
            let (left, right) = self.archetypes.split_at_mut(a.0);
            (&mut right[0], &mut left[b.0])
        }
    }

    pub fn signature_of(&self, id: ArchetypeId) -> &ComponentSignature {
        self.archetypes[id.0].signature()
    }

    /// Find or create the archetype for `signature`, building its columns
    /// from the registry for any component type in the signature that isn't
    /// already registered in an existing archetype (always true the first
    /// time a signature is seen).
    pub fn get_or_create(
        &mut self,
        signature: ComponentSignature,
        registry: &ComponentTypeRegistry,
    ) -> Result<ArchetypeId, EcsError> {
        if let Some(&id) = self.by_signature.get(&signature) {
            return Ok(id);
        }
        let mut columns: Vec<(ComponentTypeId, Box<dyn AnyColumn>)> = Vec::new();
        for id in signature.iter_ids() {
            columns.push((id, registry.new_column_for(id)?));
        }
        let archetype_id = ArchetypeId(self.archetypes.len());
        self.archetypes.push(Archetype::new(signature.clone(), columns));
        self.edges.push(Edges::default());
        self.by_signature.insert(signature, archetype_id);
        Ok(archetype_id)
    }

    /// Archetype reached by adding `component` to the signature at `from`,
    /// memoized on `from`'s outgoing add-edges.
    pub fn transition_add(
        &mut self,
        from: ArchetypeId,
        component: ComponentTypeId,
        registry: &ComponentTypeRegistry,
    ) -> Result<ArchetypeId, EcsError> {
        if let Some(&cached) = self.edges[from.0].add.get(&component) {
            return Ok(cached);
        }
        let target_sig = self.archetypes[from.0].signature().with(component);
        let target = self.get_or_create(target_sig, registry)?;
        self.edges[from.0].add.insert(component, target);
        Ok(target)
    }

    pub fn transition_remove(
        &mut self,
        from: ArchetypeId,
        component: ComponentTypeId,
        registry: &ComponentTypeRegistry,
    ) -> Result<ArchetypeId, EcsError> {
        if let Some(&cached) = self.edges[from.0].remove.get(&component) {
            return Ok(cached);
        }
        let target_sig = self.archetypes[from.0].signature().without(component);
        let target = self.get_or_create(target_sig, registry)?;
        self.edges[from.0].remove.insert(component, target);
        Ok(target)
    }

    /// Lazily iterate every archetype whose signature is a superset of
    /// `required` — the basis of every system query.
    pub fn matching(&self, required: &ComponentSignature) -> impl Iterator<Item = ArchetypeId> + '_ {
        self.archetypes.iter().enumerate().filter_map(move |(i, archetype)| {
            archetype.signature().is_superset_of(required).then_some(ArchetypeId(i))
        })
    }

    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    pub fn all(&self) -> impl Iterator<Item = ArchetypeId> {
        (0..self.archetypes.len()).map(ArchetypeId)
    }

    pub fn compact_all(&mut self, mut on_move: impl FnMut(ArchetypeId, usize, usize, crate::entity::Entity)) {
        for (i, archetype) in self.archetypes.iter_mut().enumerate() {
            let id = ArchetypeId(i);
            archetype.compact(|from, to, entity| on_move(id, from, to, entity));
        }
    }
}

impl Default for ArchetypeIndex {
    fn default() -> Self {
        Self::new()
    }
}
