//! Query system for iterating entities by component set.
//!
//! Queries resolve which archetypes contain the required components and
//! yield `(Entity, (&C1, &C2, ...))` tuples for each matching row.
//!
//! ## Soundness
//!
//! Read-only queries (`&T`) use [`World::query`], which takes `&self`.
//! Mutable queries (`&mut T`) use [`World::query_mut`], which takes
//! `&mut self`, guaranteeing exclusive access to the world and preventing
//! aliasing UB. The `&mut T` fetch is the only place in this crate that
//! needs `unsafe`.

use crate::archetype_index::ArchetypeId;
use crate::entity::Entity;
use crate::registry::ComponentTypeId;
use crate::world::World;

/// One element of a query tuple: `&T` (read) or `&mut T` (write).
pub trait QueryItem {
    type Item<'w>;
    const MUTABLE: bool;
    fn component_type_id(world: &World) -> Option<ComponentTypeId>;
    fn fetch(world: &World, archetype_id: ArchetypeId, row: usize) -> Self::Item<'_>;
}

impl<T: 'static> QueryItem for &T {
    type Item<'w> = &'w T;
    const MUTABLE: bool = false;

    fn component_type_id(world: &World) -> Option<ComponentTypeId> {
        world.registry().id_of::<T>()
    }

    fn fetch(world: &World, archetype_id: ArchetypeId, row: usize) -> Self::Item<'_> {
        let id = Self::component_type_id(world).expect("component type id resolved during type_ids()");
        world
            .archetypes()
            .get(archetype_id)
            .column::<T>(id)
            .and_then(|col| col.get(row))
            .expect("matching_archetypes guarantees this column and row exist")
    }
}

impl<T: 'static> QueryItem for &mut T {
    type Item<'w> = &'w mut T;
    const MUTABLE: bool = true;

    fn component_type_id(world: &World) -> Option<ComponentTypeId> {
        world.registry().id_of::<T>()
    }

    fn fetch(world: &World, archetype_id: ArchetypeId, row: usize) -> Self::Item<'_> {
        let id = Self::component_type_id(world).expect("component type id resolved during type_ids()");
        // Safety: only reachable via `World::query_mut`, which takes
        // `&mut World` and whose `Query::validate_no_duplicate_muts` pass
        // guarantees no two items in the same query alias the same column.
        // The cast back to `&mut World` is sound because the `'w` lifetime
        // on `QueryIterMut` is tied to that original exclusive borrow.
        #[allow(unsafe_code)]
        unsafe {
            let world_ptr = world as *const World as *mut World;
            (*world_ptr)
                .archetypes_mut()
                .get_mut(archetype_id)
                .column_mut::<T>(id)
                .and_then(|col| col.get_mut(row))
                .expect("matching_archetypes guarantees this column and row exist")
        }
    }
}

/// A tuple of [`QueryItem`]s: `(&A, &B)`, `(&mut A, &B)`, etc.
pub trait Query {
    type Item<'w>;
    const HAS_MUTABLE: bool;
    fn type_ids(world: &World) -> Option<Vec<ComponentTypeId>>;
    fn validate_no_duplicate_muts(world: &World);
    fn fetch_row(world: &World, archetype_id: ArchetypeId, row: usize) -> Self::Item<'_>;
}

fn validate_no_access_conflicts(items: &[(bool, Option<ComponentTypeId>)]) {
    let mut mutable_ids: Vec<ComponentTypeId> = Vec::new();
    let mut read_ids: Vec<ComponentTypeId> = Vec::new();
    for &(is_mutable, type_id) in items {
        let Some(id) = type_id else { continue };
        if is_mutable {
            assert!(!mutable_ids.contains(&id), "query contains duplicate mutable access to the same component type");
            assert!(!read_ids.contains(&id), "query contains overlapping read and mutable access to the same component type");
            mutable_ids.push(id);
        } else {
            assert!(!mutable_ids.contains(&id), "query contains overlapping read and mutable access to the same component type");
            read_ids.push(id);
        }
    }
}

macro_rules! impl_query_tuple {
    ($($name:ident),+) => {
        impl<$($name: QueryItem),+> Query for ($($name,)+) {
            type Item<'w> = ($($name::Item<'w>,)+);
            const HAS_MUTABLE: bool = $($name::MUTABLE)||+;

            fn type_ids(world: &World) -> Option<Vec<ComponentTypeId>> {
                Some(vec![$($name::component_type_id(world)?),+])
            }

            fn validate_no_duplicate_muts(world: &World) {
                let ids = [$(($name::MUTABLE, $name::component_type_id(world))),+];
                validate_no_access_conflicts(&ids);
            }

            #[allow(non_snake_case)]
            fn fetch_row(world: &World, archetype_id: ArchetypeId, row: usize) -> Self::Item<'_> {
                $(let $name = $name::fetch(world, archetype_id, row);)+
                ($($name,)+)
            }
        }
    };
}

impl_query_tuple!(A);
impl_query_tuple!(A, B);
impl_query_tuple!(A, B, C);
impl_query_tuple!(A, B, C, D);

fn matching_archetypes(world: &World, type_ids: &[ComponentTypeId]) -> Vec<ArchetypeId> {
    let mut required = crate::signature::ComponentSignature::empty();
    for &id in type_ids {
        required = required.with(id);
    }
    world.archetypes().matching(&required).collect()
}

/// Iterator over `(Entity, Q::Item)` for every matching row, read-only or
/// mutable depending on which [`World::query`]/[`World::query_mut`] built it.
pub struct QueryIter<'w, Q: Query> {
    world: &'w World,
    archetypes: Vec<ArchetypeId>,
    arch_cursor: usize,
    row_cursor: usize,
    _marker: std::marker::PhantomData<Q>,
}

impl<'w, Q: Query> QueryIter<'w, Q> {
    fn new(world: &'w World, archetypes: Vec<ArchetypeId>) -> Self {
        Self {
            world,
            archetypes,
            arch_cursor: 0,
            row_cursor: 0,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<'w, Q: Query> Iterator for QueryIter<'w, Q> {
    type Item = (Entity, Q::Item<'w>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let &archetype_id = self.archetypes.get(self.arch_cursor)?;
            let archetype = self.world.archetypes().get(archetype_id);
            if self.row_cursor < archetype.count() {
                let entity = archetype.entity_at(self.row_cursor);
                let item = Q::fetch_row(self.world, archetype_id, self.row_cursor);
                self.row_cursor += 1;
                return Some((entity, item));
            }
            self.arch_cursor += 1;
            self.row_cursor = 0;
        }
    }
}

impl World {
    /// Run a read-only query over every matching entity.
    ///
    /// # Panics
    ///
    /// Panics if the query contains `&mut T` items — use [`Self::query_mut`].
    pub fn query<Q: Query>(&self) -> QueryIter<'_, Q> {
        assert!(
            !Q::HAS_MUTABLE,
            "World::query() cannot be used with mutable query items (&mut T). Use World::query_mut() instead."
        );
        let type_ids = Q::type_ids(self).unwrap_or_default();
        QueryIter::new(self, matching_archetypes(self, &type_ids))
    }

    /// Run a query over every matching entity, allowing `&mut T` items.
    ///
    /// # Panics
    ///
    /// Panics if the same component type appears as `&mut T` more than once,
    /// or overlaps a `&T` of the same type, within the same query tuple.
    pub fn query_mut<Q: Query>(&mut self) -> QueryIter<'_, Q> {
        Q::validate_no_duplicate_muts(self);
        let type_ids = Q::type_ids(self).unwrap_or_default();
        QueryIter::new(self, matching_archetypes(self, &type_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CreateRecord;
    use crate::registry::ComponentTypeRegistry;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }
    #[derive(Debug, Default, Clone, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    fn setup() -> (World, ComponentTypeId, ComponentTypeId) {
        let registry = ComponentTypeRegistry::new();
        let pos = registry.register::<Pos>();
        let vel = registry.register::<Vel>();
        (World::new(registry), pos, vel)
    }

    #[test]
    fn query_matches_only_entities_with_all_components() {
        let (mut world, pos, vel) = setup();
        let e1 = world.spawn_from_record(CreateRecord {
            components: vec![
                (pos, Box::new(Pos { x: 1.0, y: 2.0 })),
                (vel, Box::new(Vel { dx: 3.0, dy: 4.0 })),
            ],
        });
        let _e2 = world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 10.0, y: 20.0 }))],
        });

        let results: Vec<_> = world.query::<(&Pos, &Vel)>().collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, e1);
        assert_eq!(results[0].1 .0, &Pos { x: 1.0, y: 2.0 });
    }

    #[test]
    fn query_spans_multiple_archetypes() {
        let (mut world, pos, vel) = setup();
        world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 1.0, y: 0.0 }))],
        });
        world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 2.0, y: 0.0 })), (vel, Box::new(Vel { dx: 0.0, dy: 0.0 }))],
        });

        let results: Vec<_> = world.query::<(&Pos,)>().collect();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn query_mut_writes_through() {
        let (mut world, pos, vel) = setup();
        let e = world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 0.0, y: 0.0 })), (vel, Box::new(Vel { dx: 1.0, dy: 2.0 }))],
        });

        for (_entity, (p, v)) in world.query_mut::<(&mut Pos, &Vel)>() {
            p.x += v.dx;
            p.y += v.dy;
        }

        let (archetype_id, slot) = world.entities().location(e).unwrap();
        assert_eq!(
            world.archetypes().get(archetype_id).column::<Pos>(pos).unwrap().get(slot),
            Some(&Pos { x: 1.0, y: 2.0 })
        );
    }

    #[test]
    #[should_panic(expected = "cannot be used with mutable query items")]
    fn query_rejects_mutable_items() {
        let (mut world, pos, _vel) = setup();
        world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 0.0, y: 0.0 }))],
        });
        let _results: Vec<_> = world.query::<(&mut Pos,)>().collect();
    }

    #[test]
    #[should_panic(expected = "overlapping read and mutable access")]
    fn query_mut_rejects_read_write_overlap_on_same_type() {
        let (mut world, pos, _vel) = setup();
        world.spawn_from_record(CreateRecord {
            components: vec![(pos, Box::new(Pos { x: 0.0, y: 0.0 }))],
        });
        let _results: Vec<_> = world.query_mut::<(&mut Pos, &Pos)>().collect();
    }
}
