//! Error types for `ecs-core`.
//!
//! Mirrors the teacher's `thiserror`-based `EcsError`: one flat enum per
//! crate, each variant carrying the data a caller needs to react without
//! re-deriving it from a string.

use thiserror::Error;

use crate::entity::Entity;
use crate::registry::ComponentTypeId;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    #[error("component type {id:?} is not registered")]
    UnknownComponent { id: ComponentTypeId },

    #[error("entity {entity} is not alive")]
    InvalidEntity { entity: Entity },

    #[error("entity {entity} has no component {id:?}")]
    ComponentMissing { entity: Entity, id: ComponentTypeId },
}
