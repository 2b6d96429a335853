//! Frame orchestrator configuration.
//!
//! Grounded on `nomai-engine/src/tick.rs`'s `TickConfig` (`fixed_dt`,
//! `Default` impl with a documented default). Fields beyond `fixed_dt` are
//! the configuration surface named explicitly: debug-only structural
//! validation, an autosave cadence hook, command bucket pre-allocation, and
//! the parallel worker count.

/// Configuration for a [`crate::orchestrator::FrameOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickConfig {
    /// Fixed simulation timestep, in seconds. Must be finite and positive.
    pub fixed_dt: f64,
    /// Whether phase 5's archetype structural validation runs. Defaults to
    /// `cfg!(debug_assertions)`; the check itself is still a `debug_assert!`
    /// at the call site, so setting this `true` in a release build has no
    /// effect without also compiling with debug assertions enabled.
    pub validate_every_tick: bool,
    /// Wall-clock seconds between autosave hooks. `0.0` disables it. The
    /// core has no persistence format of its own (see `SPEC_FULL.md` §6) —
    /// this field only exists so a host can ask the orchestrator "has it
    /// been long enough since the last save" via `FrameOrchestrator::due_for_autosave`.
    pub autosave_interval_seconds: f64,
    /// Initial capacity reserved in a freshly allocated worker [`crate::events::EventBus`]-adjacent
    /// command bucket's `Vec`s, to avoid repeated reallocation under typical
    /// per-tick structural-op volume.
    pub default_command_bucket_capacity: usize,
    /// Number of worker threads the parallel batch executor uses. `0` means
    /// "use rayon's global default pool"; any other value spins up a
    /// dedicated [`rayon::ThreadPool`] sized to that count.
    pub parallel_worker_count: usize,
}

impl TickConfig {
    pub fn new(fixed_dt: f64) -> Self {
        assert!(fixed_dt.is_finite() && fixed_dt > 0.0, "fixed_dt must be finite and positive");
        Self {
            fixed_dt,
            validate_every_tick: cfg!(debug_assertions),
            autosave_interval_seconds: 0.0,
            default_command_bucket_capacity: 0,
            parallel_worker_count: 0,
        }
    }

    pub fn validate_every_tick(mut self, validate: bool) -> Self {
        self.validate_every_tick = validate;
        self
    }

    pub fn autosave_interval_seconds(mut self, seconds: f64) -> Self {
        self.autosave_interval_seconds = seconds;
        self
    }

    pub fn default_command_bucket_capacity(mut self, capacity: usize) -> Self {
        self.default_command_bucket_capacity = capacity;
        self
    }

    pub fn parallel_worker_count(mut self, count: usize) -> Self {
        self.parallel_worker_count = count;
        self
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self::new(1.0 / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sixty_hertz() {
        let config = TickConfig::default();
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < 1e-12);
        assert_eq!(config.parallel_worker_count, 0);
    }

    #[test]
    fn default_validate_every_tick_follows_debug_assertions() {
        assert_eq!(TickConfig::default().validate_every_tick, cfg!(debug_assertions));
    }

    #[test]
    #[should_panic(expected = "finite and positive")]
    fn zero_dt_panics() {
        TickConfig::new(0.0);
    }

    #[test]
    #[should_panic(expected = "finite and positive")]
    fn nan_dt_panics() {
        TickConfig::new(f64::NAN);
    }

    #[test]
    #[should_panic(expected = "finite and positive")]
    fn negative_dt_panics() {
        TickConfig::new(-1.0 / 60.0);
    }
}
