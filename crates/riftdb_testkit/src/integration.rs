//! Cross-crate resolution harness.
//!
//! Wires an in-memory intent store, a scripted oracle, lock management,
//! and the resolver together, exposing synchronous entry points so tests
//! can drive whole resolution calls in a few lines.

use std::sync::mpsc;
use std::sync::Arc;

use riftdb_codec::HybridTime;
use riftdb_core::{
    ConflictResolver, MemoryIntentStore, ResolutionStrategy, ResolverConfig, ResolverStats,
    SharedLockManager, TransactionMeta, TxnResult, WaitQueue, WriteBatch,
};

use crate::fixtures::{far_deadline, lock_batch_for, ScriptedOracle};

/// A complete resolution environment for one test.
#[derive(Debug, Default)]
pub struct ResolutionHarness {
    /// The intents region.
    pub store: MemoryIntentStore,
    /// Scripted transaction statuses.
    pub oracle: ScriptedOracle,
    /// Resolver counters.
    pub stats: ResolverStats,
    /// Shared lock table.
    pub manager: Arc<SharedLockManager>,
    /// Resolver configuration.
    pub config: ResolverConfig,
}

impl ResolutionHarness {
    /// Creates a harness with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a harness with the given resolver configuration.
    #[must_use]
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Runs a full transactional resolution call to completion, acquiring
    /// and releasing the lock batch around it.
    ///
    /// # Errors
    ///
    /// Propagates the failure delivered through the resolution callback.
    pub fn resolve_transaction(
        &self,
        strategy: ResolutionStrategy<'_>,
        batch: &WriteBatch,
        meta: TransactionMeta,
        resolution_time: HybridTime,
        read_time: HybridTime,
    ) -> TxnResult<HybridTime> {
        let resolver = ConflictResolver::new(
            &self.store,
            &self.oracle,
            &self.stats,
            strategy,
            self.config.clone(),
        );
        let mut locks = lock_batch_for(&self.manager, batch, far_deadline())?;
        let (tx, rx) = mpsc::channel();
        resolver.resolve_transaction_conflicts(
            batch,
            meta,
            resolution_time,
            read_time,
            &mut locks,
            far_deadline(),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.recv().expect("resolution callback fired")
    }

    /// Runs a full transactional resolution call in pessimistic mode with
    /// the given wait queue.
    ///
    /// # Errors
    ///
    /// Propagates the failure delivered through the resolution callback.
    pub fn resolve_transaction_pessimistic(
        &self,
        queue: &dyn WaitQueue,
        batch: &WriteBatch,
        meta: TransactionMeta,
        resolution_time: HybridTime,
        read_time: HybridTime,
    ) -> TxnResult<HybridTime> {
        self.resolve_transaction(
            ResolutionStrategy::Pessimistic(queue),
            batch,
            meta,
            resolution_time,
            read_time,
        )
    }

    /// Runs a full single-operation resolution call to completion.
    ///
    /// # Errors
    ///
    /// Propagates the failure delivered through the resolution callback.
    pub fn resolve_operation(
        &self,
        batch: &WriteBatch,
        resolution_time: HybridTime,
    ) -> TxnResult<HybridTime> {
        let resolver = ConflictResolver::new(
            &self.store,
            &self.oracle,
            &self.stats,
            ResolutionStrategy::Optimistic,
            self.config.clone(),
        );
        let mut locks = lock_batch_for(&self.manager, batch, far_deadline())?;
        let (tx, rx) = mpsc::channel();
        resolver.resolve_operation_conflicts(
            batch,
            resolution_time,
            &mut locks,
            far_deadline(),
            Box::new(move |result| {
                let _ = tx.send(result);
            }),
        );
        rx.recv().expect("resolution callback fired")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::write_intents;
    use riftdb_codec::{DocPath, IntentType, IntentTypeSet, TransactionId};
    use riftdb_core::TransactionStatus;

    fn strong_write() -> IntentTypeSet {
        IntentTypeSet::new(&[IntentType::StrongWrite])
    }

    #[test]
    fn harness_runs_a_clean_resolution() {
        let harness = ResolutionHarness::new();
        let batch = WriteBatch::new().with(
            DocPath::from_strs(&["t", "r"]),
            riftdb_core::DocOperation::Put(vec![1]),
        );
        let meta = TransactionMeta::new(TransactionId::random(), 1);
        let result = harness
            .resolve_transaction(
                ResolutionStrategy::Optimistic,
                &batch,
                meta,
                HybridTime::from_micros(2),
                HybridTime::from_micros(1),
            )
            .unwrap();
        assert_eq!(result, HybridTime::from_micros(2));
        assert_eq!(harness.manager.num_tracked_keys(), 0);
    }

    #[test]
    fn harness_surfaces_aborts_and_counters() {
        let harness = ResolutionHarness::new();
        let victim = TransactionId::random();
        let path = DocPath::from_strs(&["t", "r"]);
        write_intents(
            &harness.store,
            victim,
            &path,
            strong_write(),
            HybridTime::from_micros(1),
        );
        harness.oracle.set(victim, TransactionStatus::Pending, 1);

        let batch = WriteBatch::new().with(path, riftdb_core::DocOperation::Put(vec![2]));
        let meta = TransactionMeta::new(TransactionId::random(), 9);
        harness
            .resolve_transaction(
                ResolutionStrategy::Optimistic,
                &batch,
                meta,
                HybridTime::from_micros(5),
                HybridTime::from_micros(1),
            )
            .unwrap();
        assert_eq!(harness.oracle.abort_requests(), vec![victim]);
        assert_eq!(harness.stats.aborts_requested(), 1);
        assert_eq!(harness.stats.resolutions(), 1);
    }
}
