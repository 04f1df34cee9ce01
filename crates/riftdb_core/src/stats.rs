//! Resolution statistics and telemetry.
//!
//! All counters are atomic and monotonically increasing; they exist for
//! external observability and correctness never depends on them.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the conflict resolver.
///
/// The conflict counter is bumped once per detected true conflict (one
/// distinct transaction forcing a hybrid-time advance), never once per
/// scanned intent.
#[derive(Debug, Default)]
pub struct ResolverStats {
    /// Distinct transactions that forced a resolution-time advance.
    conflicts: AtomicU64,
    /// Resolution calls completed, successfully or not.
    resolutions: AtomicU64,
    /// Wait-queue suspend/rescan iterations taken.
    wait_rounds: AtomicU64,
    /// Abort requests issued against lower-priority transactions.
    aborts_requested: AtomicU64,
}

impl ResolverStats {
    /// Creates a zeroed stats instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one true conflict.
    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one completed resolution call.
    pub fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one wait-queue round.
    pub fn record_wait_round(&self) {
        self.wait_rounds.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one issued abort request.
    pub fn record_abort_requested(&self) {
        self.aborts_requested.fetch_add(1, Ordering::Relaxed);
    }

    /// Total true conflicts detected.
    #[must_use]
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Total resolution calls completed.
    #[must_use]
    pub fn resolutions(&self) -> u64 {
        self.resolutions.load(Ordering::Relaxed)
    }

    /// Total wait-queue rounds.
    #[must_use]
    pub fn wait_rounds(&self) -> u64 {
        self.wait_rounds.load(Ordering::Relaxed)
    }

    /// Total abort requests issued.
    #[must_use]
    pub fn aborts_requested(&self) -> u64 {
        self.aborts_requested.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = ResolverStats::new();
        stats.record_conflict();
        stats.record_conflict();
        stats.record_resolution();
        stats.record_wait_round();
        stats.record_abort_requested();
        assert_eq!(stats.conflicts(), 2);
        assert_eq!(stats.resolutions(), 1);
        assert_eq!(stats.wait_rounds(), 1);
        assert_eq!(stats.aborts_requested(), 1);
    }
}
