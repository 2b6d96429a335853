//! Process-wide component type registration.
//!
//! Grounded on the teacher's `ComponentRegistry` (idempotent `TypeId`-keyed
//! registration), with the append-path-lock / concurrent-read-path split
//! that §5 calls for.

use std::any::{Any, TypeId};
use std::sync::Mutex;

use dashmap::DashMap;

use crate::column::{AnyColumn, ColumnStore};
use crate::error::EcsError;

/// A monotonically assigned, append-only id for a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentTypeId(pub u32);

impl ComponentTypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Everything the registry knows about one registered component type.
pub struct TypeDescriptor {
    pub id: ComponentTypeId,
    pub name: &'static str,
    pub type_id: TypeId,
    /// Builds a fresh, empty column for this component type. Stored so the
    /// archetype index can materialize a new archetype's columns without
    /// knowing the concrete `T` at the call site.
    column_factory: fn() -> Box<dyn AnyColumn>,
}

impl TypeDescriptor {
    pub fn new_column(&self) -> Box<dyn AnyColumn> {
        (self.column_factory)()
    }
}

/// Process-wide `Type -> ComponentTypeId` map.
///
/// The append path (first registration of a new type) is serialized under a
/// lock; the steady-state read path (`id_of`, repeated `register` calls) hits
/// a concurrent map and never blocks on the lock.
pub struct ComponentTypeRegistry {
    by_type: DashMap<TypeId, ComponentTypeId>,
    descriptors: Mutex<Vec<TypeDescriptor>>,
    next_id: Mutex<u32>,
}

impl ComponentTypeRegistry {
    pub fn new() -> Self {
        Self {
            by_type: DashMap::new(),
            descriptors: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Idempotent: the first call for `T` assigns the next free id; every
    /// subsequent call for the same `T` returns that id unchanged.
    pub fn register<T>(&self) -> ComponentTypeId
    where
        T: 'static + Default + Clone + Send + Sync,
    {
        let key = TypeId::of::<T>();
        if let Some(existing) = self.by_type.get(&key) {
            return *existing;
        }

        // Double-check under the append lock: another thread may have
        // registered `T` between the fast-path read above and this point.
        let mut descriptors = self.descriptors.lock().unwrap();
        if let Some(existing) = self.by_type.get(&key) {
            return *existing;
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = ComponentTypeId(*next_id);
        *next_id += 1;

        descriptors.push(TypeDescriptor {
            id,
            name: std::any::type_name::<T>(),
            type_id: key,
            column_factory: || Box::new(ColumnStore::<T>::new()),
        });
        self.by_type.insert(key, id);
        id
    }

    pub fn id_of<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).map(|id| *id)
    }

    pub fn type_of(&self, id: ComponentTypeId) -> Result<TypeId, EcsError> {
        let descriptors = self.descriptors.lock().unwrap();
        descriptors
            .get(id.index())
            .map(|d| d.type_id)
            .ok_or(EcsError::UnknownComponent { id })
    }

    pub fn name_of(&self, id: ComponentTypeId) -> Option<&'static str> {
        let descriptors = self.descriptors.lock().unwrap();
        descriptors.get(id.index()).map(|d| d.name)
    }

    pub fn new_column_for(&self, id: ComponentTypeId) -> Result<Box<dyn AnyColumn>, EcsError> {
        let descriptors = self.descriptors.lock().unwrap();
        descriptors
            .get(id.index())
            .map(|d| d.new_column())
            .ok_or(EcsError::UnknownComponent { id })
    }

    /// `-1` when no component type has been registered yet.
    pub fn highest_id(&self) -> i64 {
        let next = *self.next_id.lock().unwrap();
        next as i64 - 1
    }

    pub fn count(&self) -> usize {
        self.descriptors.lock().unwrap().len()
    }
}

impl Default for ComponentTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Downcast helper used by `World` to validate a boxed command-buffer value
/// against the registered component type before storing it in a column.
pub fn boxed_type_id(value: &(dyn Any + Send)) -> TypeId {
    value.type_id()
}
