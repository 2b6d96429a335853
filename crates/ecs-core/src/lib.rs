//! Archetype-based entity storage for high-entity-count simulations.
//!
//! Entities are grouped into [`archetype::Archetype`]s by the exact set of
//! component types they carry; components live in per-type
//! [`column::ColumnStore`]s addressed by slot index, not per-entity maps.
//! Structural changes (create, destroy, add/remove component) are deferred
//! through a [`command::CommandBuffer`] rather than applied directly by
//! systems — see that module and [`world::World`] for the phase contract.
//!
//! This crate has no scheduler or tick loop of its own; see the sibling
//! `ecs-scheduler` crate for that.

#![deny(unsafe_code)]

pub mod archetype;
pub mod archetype_index;
pub mod column;
pub mod command;
pub mod entity;
pub mod error;
pub mod manager;
pub mod query;
pub mod registry;
pub mod signature;
pub mod world;

pub mod prelude {
    pub use crate::archetype_index::ArchetypeId;
    pub use crate::command::{ApplyReport, BucketHandle, CommandBuffer, CreateRecord, EntityBuilder, PendingOps};
    pub use crate::entity::Entity;
    pub use crate::error::EcsError;
    pub use crate::query::{Query, QueryItem};
    pub use crate::registry::{ComponentTypeId, ComponentTypeRegistry};
    pub use crate::signature::ComponentSignature;
    pub use crate::world::World;
}
