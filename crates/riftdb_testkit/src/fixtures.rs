//! Test fixtures for conflict-resolution scenarios.
//!
//! Provides a scripted status oracle, helpers for seeding intent records
//! the way a real writer would, and lock-batch construction for the paths
//! a write batch touches.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use riftdb_codec::{
    encode_intent_key, encode_intent_value, DocPath, HybridTime, IntentTypeSet, TransactionId,
};
use riftdb_core::{
    AbortOutcome, LockBatch, MemoryIntentStore, SharedLockManager, TransactionStatus,
    TransactionStatusOracle, TransactionStatusRecord, TxnError, TxnResult, WriteBatch,
};

/// A deadline far enough away that tests never hit it accidentally.
#[must_use]
pub fn far_deadline() -> Instant {
    Instant::now() + Duration::from_secs(30)
}

/// Records a strong intent on `path` and the weak counterpart on each of
/// its ancestors, mirroring what a writer leaves behind.
pub fn write_intents(
    store: &MemoryIntentStore,
    owner: TransactionId,
    path: &DocPath,
    types: IntentTypeSet,
    ht: HybridTime,
) {
    let value = encode_intent_value(owner, b"testkit");
    store.insert_intent(encode_intent_key(path, types, ht), value.clone());
    for ancestor in path.ancestors() {
        store.insert_intent(
            encode_intent_key(&ancestor, types.to_weak(), ht),
            value.clone(),
        );
    }
}

/// Acquires a lock batch covering every path a write batch touches: the
/// strong set on each exact path, the weak counterpart on each ancestor.
///
/// # Errors
///
/// Returns a timeout error if the locks cannot be acquired in time.
pub fn lock_batch_for(
    manager: &Arc<SharedLockManager>,
    batch: &WriteBatch,
    deadline: Instant,
) -> TxnResult<LockBatch> {
    let mut keys = Vec::new();
    for (path, ops) in batch.iter() {
        let mut strong = IntentTypeSet::empty();
        for op in ops {
            strong = strong.union(op.intent_types());
        }
        keys.push((Bytes::from(path.encode()), strong));
        for ancestor in path.ancestors() {
            keys.push((Bytes::from(ancestor.encode()), strong.to_weak()));
        }
    }
    LockBatch::acquire(Arc::clone(manager), keys, deadline)
}

/// A status oracle driven entirely by scripted per-transaction answers.
///
/// Records every abort request and the size of every status batch, so
/// tests can assert on oracle traffic as well as outcomes.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    statuses: Mutex<HashMap<TransactionId, (TransactionStatus, u64)>>,
    abort_outcomes: Mutex<HashMap<TransactionId, TransactionStatus>>,
    abort_requests: Mutex<Vec<TransactionId>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl ScriptedOracle {
    /// Creates an oracle with no scripted transactions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the status and priority returned for a transaction.
    pub fn set(&self, id: TransactionId, status: TransactionStatus, priority: u64) {
        self.statuses.lock().insert(id, (status, priority));
    }

    /// Scripts the outcome of an abort request against `id`, overriding
    /// the default behavior of flipping the target to aborted.
    pub fn set_abort_outcome(&self, id: TransactionId, status: TransactionStatus) {
        self.abort_outcomes.lock().insert(id, status);
    }

    /// Abort requests observed so far, in order.
    #[must_use]
    pub fn abort_requests(&self) -> Vec<TransactionId> {
        self.abort_requests.lock().clone()
    }

    /// Status-batch sizes observed so far, in order.
    #[must_use]
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().clone()
    }
}

impl TransactionStatusOracle for ScriptedOracle {
    fn get_statuses(
        &self,
        ids: &[TransactionId],
        _as_of: HybridTime,
        _deadline: Instant,
    ) -> TxnResult<Vec<TransactionStatusRecord>> {
        self.batch_sizes.lock().push(ids.len());
        let statuses = self.statuses.lock();
        ids.iter()
            .map(|id| {
                let (status, priority) = statuses
                    .get(id)
                    .copied()
                    .ok_or_else(|| TxnError::oracle_unavailable(format!("unknown {id}")))?;
                Ok(TransactionStatusRecord {
                    id: *id,
                    status,
                    priority,
                })
            })
            .collect()
    }

    fn request_abort(&self, id: TransactionId, _deadline: Instant) -> TxnResult<AbortOutcome> {
        self.abort_requests.lock().push(id);
        if let Some(status) = self.abort_outcomes.lock().get(&id).copied() {
            return Ok(AbortOutcome { status });
        }
        let mut statuses = self.statuses.lock();
        if let Some((status, _)) = statuses.get_mut(&id) {
            *status = TransactionStatus::Aborted;
        }
        Ok(AbortOutcome {
            status: TransactionStatus::Aborted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftdb_codec::IntentType;

    #[test]
    fn write_intents_cover_ancestors() {
        let store = MemoryIntentStore::new();
        write_intents(
            &store,
            TransactionId::random(),
            &DocPath::from_strs(&["t", "r", "c"]),
            IntentTypeSet::new(&[IntentType::StrongWrite]),
            HybridTime::from_micros(1),
        );
        // One strong record plus a weak marker on each of two ancestors.
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn scripted_oracle_flips_pending_to_aborted() {
        let oracle = ScriptedOracle::new();
        let id = TransactionId::random();
        oracle.set(id, TransactionStatus::Pending, 7);

        let outcome = oracle.request_abort(id, far_deadline()).unwrap();
        assert_eq!(outcome.status, TransactionStatus::Aborted);

        let records = oracle
            .get_statuses(&[id], HybridTime::MIN, far_deadline())
            .unwrap();
        assert_eq!(records[0].status, TransactionStatus::Aborted);
        assert_eq!(records[0].priority, 7);
        assert_eq!(oracle.abort_requests(), vec![id]);
    }

    #[test]
    fn unknown_transaction_is_an_oracle_failure() {
        let oracle = ScriptedOracle::new();
        let result = oracle.get_statuses(
            &[TransactionId::random()],
            HybridTime::MIN,
            far_deadline(),
        );
        assert!(matches!(result, Err(TxnError::OracleUnavailable { .. })));
    }
}
