//! Per-tick and cross-tick timing diagnostics.
//!
//! `TickDiagnostics` is grounded on `nomai-engine/src/tick.rs`'s own
//! `TickDiagnostics`: one entry per system plus a command-buffer-apply entry
//! and a total, reset every tick. `SystemStatsTable` is new code implementing
//! the spec's "last/average/peak `update` time via an exponential moving
//! average" statistics requirement, which has no teacher counterpart (the
//! teacher's diagnostics are single-tick snapshots only).

use std::time::Duration;

/// Smoothing factor for the exponential moving average: how much weight the
/// newest sample carries. Same constant the teacher uses for its own frame-
/// time smoothing in `nomai-engine/src/tick.rs`.
const EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemStats {
    pub last: Duration,
    pub average: Duration,
    pub peak: Duration,
}

impl SystemStats {
    fn record(&mut self, elapsed: Duration) {
        self.last = elapsed;
        if elapsed > self.peak {
            self.peak = elapsed;
        }
        let avg = self.average.as_secs_f64();
        let updated = avg + EMA_ALPHA * (elapsed.as_secs_f64() - avg);
        self.average = Duration::from_secs_f64(updated.max(0.0));
    }
}

/// Per-system-index EMA table, persisted across ticks on `FrameOrchestrator`.
/// Indexed by registration index, the same index `SystemAccess`/`explicit_after`
/// use, so a system's row survives disable/re-enable without renumbering.
#[derive(Debug, Clone, Default)]
pub struct SystemStatsTable {
    by_index: Vec<SystemStats>,
}

impl SystemStatsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, index: usize, elapsed: Duration) {
        if index >= self.by_index.len() {
            self.by_index.resize(index + 1, SystemStats::default());
        }
        self.by_index[index].record(elapsed);
    }

    pub fn get(&self, index: usize) -> Option<SystemStats> {
        self.by_index.get(index).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    pub system_times: Vec<(&'static str, Duration)>,
    pub command_apply_time: Duration,
    pub compaction_time: Duration,
    pub total_time: Duration,
}

impl TickDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_system(&mut self, name: &'static str, elapsed: Duration) {
        self.system_times.push((name, elapsed));
    }

    pub fn slowest_system(&self) -> Option<(&'static str, Duration)> {
        self.system_times.iter().copied().max_by_key(|(_, d)| *d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slowest_system_picks_the_max() {
        let mut diag = TickDiagnostics::new();
        diag.record_system("a", Duration::from_micros(5));
        diag.record_system("b", Duration::from_micros(50));
        diag.record_system("c", Duration::from_micros(20));
        assert_eq!(diag.slowest_system(), Some(("b", Duration::from_micros(50))));
    }

    #[test]
    fn empty_diagnostics_has_no_slowest() {
        assert_eq!(TickDiagnostics::new().slowest_system(), None);
    }

    #[test]
    fn stats_table_tracks_last_and_peak() {
        let mut table = SystemStatsTable::new();
        table.record(2, Duration::from_micros(10));
        table.record(2, Duration::from_micros(30));
        table.record(2, Duration::from_micros(20));
        let stats = table.get(2).unwrap();
        assert_eq!(stats.last, Duration::from_micros(20));
        assert_eq!(stats.peak, Duration::from_micros(30));
    }

    #[test]
    fn stats_table_average_moves_toward_samples() {
        let mut table = SystemStatsTable::new();
        for _ in 0..200 {
            table.record(0, Duration::from_micros(100));
        }
        let stats = table.get(0).unwrap();
        assert!((stats.average.as_micros() as i64 - 100).abs() <= 1);
    }

    #[test]
    fn unrecorded_index_has_no_stats() {
        let table = SystemStatsTable::new();
        assert_eq!(table.get(5), None);
    }
}
