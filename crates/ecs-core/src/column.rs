//! Type-erased per-component-type storage.
//!
//! [`ColumnStore<T>`] is the concrete Structure-of-Arrays vector for one
//! component type. [`Archetype`](crate::archetype::Archetype) stores a
//! heterogeneous list of columns behind the object-safe [`AnyColumn`] trait,
//! downcasting to `ColumnStore<T>` only when a typed slice is requested.
//!
//! Unlike a raw-byte vtable column, this needs no `unsafe`: every operation
//! that crosses the type-erasure boundary goes through [`std::any::Any`].

use std::any::Any;

/// Object-safe operations every column must support regardless of its
/// element type. All of these preserve the invariant that every column in an
/// archetype has the same length as that archetype's `entities` vector.
pub trait AnyColumn: Any + Send + Sync {
    /// Append one default-constructed element.
    fn push_default(&mut self);

    /// Swap the element at `last` into `slot` and pop `last`. `last` must be
    /// `len() - 1`; callers (the archetype) guarantee this.
    fn remove_swap(&mut self, slot: usize, last: usize);

    /// Swap the elements at `a` and `b` in place (used by compaction, which
    /// needs the elements to trade places rather than one replacing another).
    fn swap_internal(&mut self, a: usize, b: usize);

    /// Shrink the column to `len` elements, dropping the tail.
    fn truncate(&mut self, len: usize);

    /// Number of elements currently stored.
    fn len(&self) -> usize;

    /// Copy the value at `src_slot` in `self` into a freshly pushed default
    /// slot of `other` (used during archetype transitions for shared
    /// component types). Panics if the dynamic types don't match; callers
    /// only pair columns of the same `ComponentTypeId`.
    fn copy_slot_to(&self, src_slot: usize, other: &mut dyn AnyColumn);

    /// Overwrite the existing value at `dst_slot` in `other` with the value
    /// at `src_slot` in `self`. Unlike `copy_slot_to`, `other` must already
    /// have a slot at `dst_slot` (used when the destination archetype has
    /// already allocated the slot via `allocate_slot`, which pushes a
    /// default value for every column up front).
    fn copy_slot_into(&self, src_slot: usize, other: &mut dyn AnyColumn, dst_slot: usize);

    /// Overwrite the value at `slot` with a boxed value of this column's
    /// element type. Panics if the boxed value's type doesn't match.
    fn set_boxed(&mut self, slot: usize, value: Box<dyn Any + Send>);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A typed Structure-of-Arrays vector for component type `T`.
#[derive(Debug, Default)]
pub struct ColumnStore<T> {
    values: Vec<T>,
}

impl<T: 'static + Default + Clone + Send + Sync> ColumnStore<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn get_slice(&self) -> &[T] {
        &self.values
    }

    pub fn get_slice_mut(&mut self) -> &mut [T] {
        &mut self.values
    }

    pub fn get(&self, slot: usize) -> Option<&T> {
        self.values.get(slot)
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.values.get_mut(slot)
    }

    pub fn set(&mut self, slot: usize, value: T) {
        if let Some(slot_ref) = self.values.get_mut(slot) {
            *slot_ref = value;
        }
    }
}

impl<T: 'static + Default + Clone + Send + Sync> AnyColumn for ColumnStore<T> {
    fn push_default(&mut self) {
        self.values.push(T::default());
    }

    fn remove_swap(&mut self, slot: usize, last: usize) {
        debug_assert_eq!(last, self.values.len().saturating_sub(1));
        self.values.swap(slot, last);
        self.values.pop();
    }

    fn swap_internal(&mut self, a: usize, b: usize) {
        self.values.swap(a, b);
    }

    fn truncate(&mut self, len: usize) {
        self.values.truncate(len);
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn copy_slot_to(&self, src_slot: usize, other: &mut dyn AnyColumn) {
        let value = self.values[src_slot].clone();
        let other = other
            .as_any_mut()
            .downcast_mut::<ColumnStore<T>>()
            .expect("copy_slot_to: mismatched column element type");
        other.values.push(value);
    }

    fn copy_slot_into(&self, src_slot: usize, other: &mut dyn AnyColumn, dst_slot: usize) {
        let value = self.values[src_slot].clone();
        let other = other
            .as_any_mut()
            .downcast_mut::<ColumnStore<T>>()
            .expect("copy_slot_into: mismatched column element type");
        other.values[dst_slot] = value;
    }

    fn set_boxed(&mut self, slot: usize, value: Box<dyn Any + Send>) {
        let value = *value
            .downcast::<T>()
            .expect("set_boxed: mismatched column element type");
        self.set(slot, value);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
