//! System trait and access metadata.
//!
//! Grounded on `saptak7777-Archetype-ECS/src/system.rs`'s `SystemAccess` /
//! `conflicts_with`, generalized from raw `TypeId`s to `ecs_core`'s
//! registered `ComponentTypeId`s, and extended with the tick-rate bucketing
//! this spec calls for.

use ecs_core::prelude::{CommandBuffer, ComponentTypeId};
use ecs_core::world::World;

use crate::persistence::{SaveReader, SaveWriter};

/// How often a system is due to run, evaluated once per frame by the
/// orchestrator against its own tick counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRate {
    /// Runs every frame.
    EveryFrame,
    /// Runs once every `N` frames (`Hz(1)` is equivalent to `EveryFrame`).
    Hz(u32),
    /// Never dispatched by the orchestrator's automatic loop; only runs when
    /// explicitly invoked.
    Manual,
}

impl TickRate {
    /// Whether a system on this rate is due at `tick` (0-indexed), given the
    /// simulation's fixed timestep `fixed_dt`.
    ///
    /// `Hz(n)` means *n times per second of sim time*, not "every nth tick":
    /// at a 16ms fixed step, `Hz(10)` over 125 ticks (~2s of sim time) must
    /// fire ~20 times regardless of what the tick rate happens to be, so this
    /// tracks how many `1/n`-second boundaries sim time has crossed since the
    /// previous tick rather than taking `tick % n`.
    pub fn is_due(self, tick: u64, fixed_dt: f64) -> bool {
        match self {
            TickRate::EveryFrame => true,
            TickRate::Manual => false,
            TickRate::Hz(n) if n <= 1 => true,
            TickRate::Hz(n) => {
                let cycles_at = |t: u64| (t as f64 * fixed_dt * n as f64).floor();
                let now = cycles_at(tick);
                let prev = match tick.checked_sub(1) {
                    Some(t) => cycles_at(t),
                    None => -1.0,
                };
                now > prev
            }
        }
    }
}

/// The set of component types a system reads and writes, used to detect
/// conflicts between systems that might run in the same parallel batch.
#[derive(Debug, Clone, Default)]
pub struct SystemAccess {
    pub reads: Vec<ComponentTypeId>,
    pub writes: Vec<ComponentTypeId>,
}

impl SystemAccess {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn reading(mut self, id: ComponentTypeId) -> Self {
        self.reads.push(id);
        self
    }

    pub fn writing(mut self, id: ComponentTypeId) -> Self {
        self.writes.push(id);
        self
    }

    /// True if running `self` and `other` concurrently could race: any
    /// write/write, write/read, or read/write pair on the same component
    /// type. Read/read never conflicts.
    pub fn conflicts_with(&self, other: &SystemAccess) -> bool {
        self.writes.iter().any(|w| other.writes.contains(w))
            || self.writes.iter().any(|w| other.reads.contains(w))
            || self.reads.iter().any(|r| other.writes.contains(r))
    }
}

/// A unit of scheduled work. Systems are run with exclusive-but-disjoint
/// access to `World` (see `parallel::execute_batch`'s safety argument) and
/// shared access to the frame's `CommandBuffer`.
pub trait System: Send + Sync {
    fn name(&self) -> &'static str;
    fn access(&self) -> SystemAccess;
    fn tick_rate(&self) -> TickRate {
        TickRate::EveryFrame
    }
    /// Whether this system's timing is recorded into the orchestrator's
    /// per-system statistics table. Debug builds always record regardless of
    /// this value; release builds record only when a system opts in, since
    /// `Instant::now()` around every system in every batch is measurable
    /// overhead at the scale this scheduler targets.
    fn stats_enabled(&self) -> bool {
        cfg!(debug_assertions)
    }
    fn run(&mut self, world: &mut World, commands: &CommandBuffer);

    /// Called once, synchronously, the tick a queued enable takes effect.
    /// Never called for a system that starts enabled at registration.
    fn on_enable(&mut self) {}

    /// Called once, synchronously, the tick a queued disable or unregister
    /// takes effect.
    fn on_disable(&mut self) {}

    /// Write this system's persistent state, if it has any. Called by
    /// `FrameOrchestrator::save_all` outside the tick loop; the default
    /// no-op is correct for any system with no state worth persisting.
    fn save_state(&self, _writer: &mut dyn SaveWriter) {}

    /// Restore state previously written by `save_state`, in the same field
    /// order. Called by `FrameOrchestrator::load_all`.
    fn load_state(&mut self, _reader: &mut dyn SaveReader) {}
}

pub type BoxedSystem = Box<dyn System>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_write_conflicts() {
        let a = SystemAccess::empty().writing(ComponentTypeId(0));
        let b = SystemAccess::empty().writing(ComponentTypeId(0));
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn read_read_does_not_conflict() {
        let a = SystemAccess::empty().reading(ComponentTypeId(0));
        let b = SystemAccess::empty().reading(ComponentTypeId(0));
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn write_read_conflicts() {
        let a = SystemAccess::empty().writing(ComponentTypeId(1));
        let b = SystemAccess::empty().reading(ComponentTypeId(1));
        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn disjoint_types_never_conflict() {
        let a = SystemAccess::empty().writing(ComponentTypeId(1));
        let b = SystemAccess::empty().writing(ComponentTypeId(2));
        assert!(!a.conflicts_with(&b));
    }

    #[test]
    fn hz_rate_due_on_wall_clock_cadence() {
        // fixed_dt = 0.25s, Hz(1) in sim-time-per-second terms: a quarter
        // crossed per tick, so Hz(4) should be due every tick and Hz(2) every
        // other tick.
        let dt = 0.25;
        assert!(TickRate::Hz(4).is_due(0, dt));
        assert!(TickRate::Hz(4).is_due(1, dt));
        assert!(TickRate::Hz(4).is_due(2, dt));

        let rate = TickRate::Hz(2);
        assert!(rate.is_due(0, dt));
        assert!(!rate.is_due(1, dt));
        assert!(rate.is_due(2, dt));
    }

    #[test]
    fn hz_ten_over_125_ticks_at_16ms_fires_about_twenty_times() {
        let dt = 0.016;
        let hits = (0..125u64).filter(|&t| TickRate::Hz(10).is_due(t, dt)).count();
        assert!((19..=21).contains(&hits), "expected ~20 fires, got {hits}");
    }

    #[test]
    fn manual_rate_never_auto_due() {
        assert!(!TickRate::Manual.is_due(0, 0.016));
        assert!(!TickRate::Manual.is_due(100, 0.016));
    }
}
