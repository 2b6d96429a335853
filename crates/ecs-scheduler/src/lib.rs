//! Dependency-aware, conflict-batched parallel system scheduling and the
//! fixed-timestep frame orchestrator that drives an `ecs_core::World`
//! through a tick.
//!
//! This crate owns no entity storage of its own — it only sequences calls
//! into `ecs_core`.

pub mod cache;
pub mod config;
pub mod dependency;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod parallel;
pub mod persistence;
pub mod stats;
pub mod system;

pub mod prelude {
    pub use crate::config::TickConfig;
    pub use crate::dependency::{DependencyGraph, ExecutionBatch};
    pub use crate::error::SchedulerError;
    pub use crate::events::{
        EntityBatchCreated, EntityBatchDestroyRequest, EntityBatchDestroyed, EventBus, WorldLoad, WorldLoaded,
        WorldSave, WorldSaved, WorldSystemsUpdated,
    };
    pub use crate::orchestrator::FrameOrchestrator;
    pub use crate::persistence::{LoadProfile, SaveProfile, SaveReader, SaveWriter};
    pub use crate::stats::{SystemStats, SystemStatsTable, TickDiagnostics};
    pub use crate::system::{BoxedSystem, System, SystemAccess, TickRate};
}
