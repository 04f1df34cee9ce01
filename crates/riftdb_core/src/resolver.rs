//! Conflict resolution for write batches.
//!
//! Given a candidate write batch and the current hybrid time, the resolver
//! reads every intent in the store that could conflict with the intents
//! the candidate would write, forms the set of conflicting transactions,
//! and drives the call to a terminal outcome: allow (possibly with an
//! advanced hybrid time), suspend-and-retry, or fail.
//!
//! Two entry points share the scan/classify machinery:
//!
//! - [`ConflictResolver::resolve_transaction_conflicts`] for a
//!   transaction's write batch. Lower-priority pending transactions are
//!   aborted; committed transactions newer than the read time force the
//!   resolution time forward.
//! - [`ConflictResolver::resolve_operation_conflicts`] for a
//!   non-transactional operation batch. The success value is at least the
//!   maximal commit time among conflicting committed transactions, so the
//!   caller can order its own write strictly after them.

use std::collections::BTreeMap;
use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, trace};

use riftdb_codec::{
    extract_transaction_id, intent_scan_bounds, parse_intent_key, DocPath, HybridTime,
    IntentTypeSet, TransactionId,
};

use crate::config::ResolverConfig;
use crate::error::{TxnError, TxnResult};
use crate::lock_manager::LockBatch;
use crate::oracle::{TransactionStatus, TransactionStatusOracle, TransactionStatusRecord};
use crate::stats::ResolverStats;
use crate::store::IntentStore;
use crate::types::{TransactionMeta, WriteBatch};
use crate::wait_queue::{BlockerInfo, WaitEntry, WaitQueue};

/// Single-shot completion callback for one resolution call.
///
/// Invoked exactly once with either the final (possibly advanced)
/// resolution hybrid time or the failure. After a pessimistic suspension
/// it runs on whichever worker context resumed the call, so it must be
/// `Send`.
pub type ResolutionCallback = Box<dyn FnOnce(TxnResult<HybridTime>) + Send>;

/// How the resolver handles conflicts it cannot decide by aborting.
///
/// Selected at construction time; the two modes share all scan and
/// classification machinery.
#[derive(Clone, Copy)]
pub enum ResolutionStrategy<'a> {
    /// Reject the candidate with a retryable conflict error.
    Optimistic,
    /// Suspend on the wait queue until the blockers resolve, then rescan.
    Pessimistic(&'a dyn WaitQueue),
}

impl std::fmt::Debug for ResolutionStrategy<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optimistic => f.write_str("Optimistic"),
            Self::Pessimistic(_) => f.write_str("Pessimistic"),
        }
    }
}

/// The conflict-resolution engine for one tablet.
pub struct ConflictResolver<'a> {
    store: &'a dyn IntentStore,
    oracle: &'a dyn TransactionStatusOracle,
    stats: &'a ResolverStats,
    strategy: ResolutionStrategy<'a>,
    config: ResolverConfig,
}

impl std::fmt::Debug for ConflictResolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolver")
            .field("stats", &self.stats)
            .field("strategy", &self.strategy)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// The candidate on whose behalf one resolution call runs.
struct Candidate<'b> {
    write_batch: &'b WriteBatch,
    /// Owning transaction, if any; its own intents are never conflicts.
    own_id: Option<TransactionId>,
    priority: u64,
    /// Commits at or below this time are invisible to the candidate.
    read_floor: HybridTime,
}

impl Candidate<'_> {
    fn describe(&self) -> String {
        match self.own_id {
            Some(id) => format!("transaction {id}"),
            None => "single operation".to_string(),
        }
    }
}

/// Conflicts accumulated for one owning transaction during a scan.
#[derive(Debug, Default)]
struct ConflictingTransaction {
    types: IntentTypeSet,
    entries: Vec<WaitEntry>,
}

type ConflictMap = BTreeMap<TransactionId, ConflictingTransaction>;

/// Outcome of classifying one round of conflicts.
enum Decision {
    Proceed,
    Wait(Vec<BlockerInfo>),
}

impl<'a> ConflictResolver<'a> {
    /// Creates a resolver over the given store, oracle, and stats, with
    /// the conflict-handling strategy fixed for its lifetime.
    #[must_use]
    pub fn new(
        store: &'a dyn IntentStore,
        oracle: &'a dyn TransactionStatusOracle,
        stats: &'a ResolverStats,
        strategy: ResolutionStrategy<'a>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            store,
            oracle,
            stats,
            strategy,
            config,
        }
    }

    /// Resolves conflicts for a transaction's write batch.
    ///
    /// Preconditions: `lock_batch` already holds locks covering every path
    /// in `write_batch`, and `resolution_time >= read_time`.
    ///
    /// The callback receives the final resolution time on success. It is
    /// at least `resolution_time` and advances past the commit time of any
    /// conflicting transaction that committed after `read_time`; each such
    /// transaction bumps the conflict counter exactly once.
    #[allow(clippy::too_many_arguments)]
    pub fn resolve_transaction_conflicts(
        &self,
        write_batch: &WriteBatch,
        meta: TransactionMeta,
        resolution_time: HybridTime,
        read_time: HybridTime,
        lock_batch: &mut LockBatch,
        deadline: Instant,
        callback: ResolutionCallback,
    ) {
        let candidate = Candidate {
            write_batch,
            own_id: Some(meta.id),
            priority: meta.priority,
            read_floor: read_time,
        };
        let result = if resolution_time < read_time {
            Err(TxnError::invalid_argument(format!(
                "resolution time {resolution_time} below read time {read_time}"
            )))
        } else {
            self.resolve(&candidate, resolution_time, lock_batch, deadline)
        };
        self.stats.record_resolution();
        callback(result);
    }

    /// Resolves conflicts for a non-transactional operation batch.
    ///
    /// There is no owning transaction: every conflict is against some
    /// other real transaction, and single operations outrank all of them,
    /// so pending owners become abort candidates. On success the callback
    /// receives a hybrid time at least as large as the maximal commit time
    /// among conflicting committed transactions, letting the caller
    /// re-order its effective write time strictly after them.
    pub fn resolve_operation_conflicts(
        &self,
        write_batch: &WriteBatch,
        resolution_time: HybridTime,
        lock_batch: &mut LockBatch,
        deadline: Instant,
        callback: ResolutionCallback,
    ) {
        let candidate = Candidate {
            write_batch,
            own_id: None,
            priority: u64::MAX,
            read_floor: HybridTime::MIN,
        };
        let result = self.resolve(&candidate, resolution_time, lock_batch, deadline);
        self.stats.record_resolution();
        callback(result);
    }

    fn resolve(
        &self,
        candidate: &Candidate<'_>,
        mut resolution_time: HybridTime,
        lock_batch: &mut LockBatch,
        deadline: Instant,
    ) -> TxnResult<HybridTime> {
        if !lock_batch.is_held() {
            return Err(TxnError::invalid_argument(
                "lock batch must be held on entry",
            ));
        }
        let candidates = candidate_intents(candidate.write_batch);
        debug!(
            candidate = %candidate.describe(),
            paths = candidates.len(),
            %resolution_time,
            "resolving conflicts"
        );

        let mut wait_rounds = 0usize;
        loop {
            let conflicts = self.scan_conflicts(candidate, &candidates)?;
            if conflicts.is_empty() {
                return Ok(resolution_time);
            }
            match self.classify(candidate, conflicts, &mut resolution_time, deadline)? {
                Decision::Proceed => return Ok(resolution_time),
                Decision::Wait(blockers) => {
                    let ResolutionStrategy::Pessimistic(queue) = self.strategy else {
                        // classify only returns Wait in pessimistic mode.
                        return Err(TxnError::conflict("blocking conflict in optimistic mode"));
                    };
                    wait_rounds += 1;
                    if wait_rounds > self.config.max_wait_rounds {
                        return Err(TxnError::timed_out("exceeded wait-round bound"));
                    }
                    self.stats.record_wait_round();
                    debug!(
                        candidate = %candidate.describe(),
                        blockers = blockers.len(),
                        round = wait_rounds,
                        "suspending until conflicting transactions resolve"
                    );

                    // The lock batch must be restored no matter how the
                    // wait ends, so both results are captured before
                    // either is propagated.
                    let released = lock_batch.temporarily_release();
                    let wait_result = queue.wait_on(candidate.own_id, &blockers, deadline);
                    let relock_result = released.reacquire(deadline);
                    wait_result?;
                    relock_result?;
                    // Conflicts may have changed while suspended; rescan.
                }
            }
        }
    }

    /// Scans the intents region for records conflicting with the
    /// candidate's intents and groups them by owning transaction.
    fn scan_conflicts(
        &self,
        candidate: &Candidate<'_>,
        candidates: &BTreeMap<DocPath, IntentTypeSet>,
    ) -> TxnResult<ConflictMap> {
        let mut conflicts = ConflictMap::new();
        for (path, candidate_types) in candidates {
            let (lower, upper) = intent_scan_bounds(path);
            for item in self.store.scan_intents(&lower, &upper)? {
                let (key, value) = item?;
                let parsed = parse_intent_key(&key, &value)?;
                if !candidate_types.conflicts_with(parsed.types) {
                    continue;
                }
                let owner = extract_transaction_id(&value)?;
                if candidate.own_id == Some(owner) {
                    continue;
                }
                trace!(
                    %owner,
                    path = %parsed.doc_path,
                    types = %parsed.types,
                    ht = %parsed.doc_ht,
                    "conflicting intent"
                );
                let info = conflicts.entry(owner).or_default();
                info.types = info.types.union(parsed.types);
                let encoded = Bytes::from(path.encode());
                match info.entries.iter_mut().find(|e| e.key == encoded) {
                    Some(entry) => entry.types = entry.types.union(parsed.types),
                    None => info.entries.push(WaitEntry {
                        key: encoded,
                        types: parsed.types,
                    }),
                }
            }
        }
        Ok(conflicts)
    }

    /// Queries the oracle for every conflicting owner (coalesced into as
    /// few round-trips as the batch limit allows) and applies the decision
    /// policy.
    fn classify(
        &self,
        candidate: &Candidate<'_>,
        conflicts: ConflictMap,
        resolution_time: &mut HybridTime,
        deadline: Instant,
    ) -> TxnResult<Decision> {
        let ids: Vec<_> = conflicts.keys().copied().collect();
        let mut records = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(self.config.status_batch_limit.max(1)) {
            let answered = self.oracle.get_statuses(chunk, *resolution_time, deadline)?;
            if answered.len() != chunk.len() {
                return Err(TxnError::oracle_unavailable(format!(
                    "asked for {} statuses, got {}",
                    chunk.len(),
                    answered.len()
                )));
            }
            records.extend(answered);
        }

        let mut blockers = Vec::new();
        for record in records {
            match record.status {
                TransactionStatus::Aborted => {
                    // Defunct intents awaiting cleanup.
                    trace!(id = %record.id, "conflicting transaction already aborted");
                }
                TransactionStatus::Committed(commit_time) => {
                    self.observe_commit(candidate, record.id, commit_time, resolution_time);
                }
                TransactionStatus::Pending => {
                    if record.priority < candidate.priority {
                        self.try_abort(candidate, &conflicts, &record, resolution_time, deadline, &mut blockers)?;
                    } else {
                        self.block_or_reject(candidate, &conflicts, &record, &mut blockers)?;
                    }
                }
            }
        }

        if blockers.is_empty() {
            Ok(Decision::Proceed)
        } else {
            Ok(Decision::Wait(blockers))
        }
    }

    /// A committed conflicting transaction is not a true conflict for
    /// snapshot consistency, but commits after the read floor force the
    /// resolution time past their commit time. One counter bump per
    /// distinct owner.
    fn observe_commit(
        &self,
        candidate: &Candidate<'_>,
        id: TransactionId,
        commit_time: HybridTime,
        resolution_time: &mut HybridTime,
    ) {
        if commit_time <= candidate.read_floor {
            trace!(%id, %commit_time, "commit below read floor, invisible");
            return;
        }
        if commit_time > *resolution_time {
            debug!(%id, %commit_time, "advancing resolution time past commit");
            *resolution_time = commit_time;
        }
        self.stats.record_conflict();
    }

    /// Issues an abort against a lower-priority pending transaction and
    /// re-classifies it from the outcome: the abort may have lost the race
    /// with a commit, or the target may remain pending.
    fn try_abort(
        &self,
        candidate: &Candidate<'_>,
        conflicts: &ConflictMap,
        record: &TransactionStatusRecord,
        resolution_time: &mut HybridTime,
        deadline: Instant,
        blockers: &mut Vec<BlockerInfo>,
    ) -> TxnResult<()> {
        debug!(
            target = %record.id,
            target_priority = record.priority,
            candidate_priority = candidate.priority,
            "aborting lower-priority transaction"
        );
        self.stats.record_abort_requested();
        let outcome = self.oracle.request_abort(record.id, deadline)?;
        match outcome.status {
            TransactionStatus::Aborted => Ok(()),
            TransactionStatus::Committed(commit_time) => {
                self.observe_commit(candidate, record.id, commit_time, resolution_time);
                Ok(())
            }
            TransactionStatus::Pending => {
                // Lost the abort race and the target is still live.
                self.block_or_reject(candidate, conflicts, record, blockers)
            }
        }
    }

    /// A pending transaction the candidate may not abort: reject in
    /// optimistic mode, enqueue as a blocker in pessimistic mode.
    fn block_or_reject(
        &self,
        candidate: &Candidate<'_>,
        conflicts: &ConflictMap,
        record: &TransactionStatusRecord,
        blockers: &mut Vec<BlockerInfo>,
    ) -> TxnResult<()> {
        match self.strategy {
            ResolutionStrategy::Optimistic => {
                let types = conflicts
                    .get(&record.id)
                    .map(|info| info.types)
                    .unwrap_or_else(IntentTypeSet::empty);
                Err(TxnError::conflict(format!(
                    "{} blocked by pending transaction {} (priority {} >= {}) holding {}",
                    candidate.describe(),
                    record.id,
                    record.priority,
                    candidate.priority,
                    types,
                )))
            }
            ResolutionStrategy::Pessimistic(_) => {
                let entries = conflicts
                    .get(&record.id)
                    .map(|info| info.entries.clone())
                    .unwrap_or_default();
                blockers.push(BlockerInfo {
                    id: record.id,
                    entries,
                });
                Ok(())
            }
        }
    }
}

/// Derives the full intent map the candidate operation would itself
/// write: the strong set on each touched path, and the weak counterpart
/// on every path-prefix ancestor, so a range operation on an ancestor
/// correctly detects activity below it.
fn candidate_intents(write_batch: &WriteBatch) -> BTreeMap<DocPath, IntentTypeSet> {
    let mut map: BTreeMap<DocPath, IntentTypeSet> = BTreeMap::new();
    for (path, ops) in write_batch.iter() {
        let mut strong = IntentTypeSet::empty();
        for op in ops {
            strong = strong.union(op.intent_types());
        }
        let weak = strong.to_weak();
        for ancestor in path.ancestors() {
            let entry = map.entry(ancestor).or_insert_with(IntentTypeSet::empty);
            *entry = entry.union(weak);
        }
        let entry = map.entry(path.clone()).or_insert_with(IntentTypeSet::empty);
        *entry = entry.union(strong);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocOperation;
    use riftdb_codec::IntentType;

    fn strong_write() -> IntentTypeSet {
        IntentTypeSet::new(&[IntentType::StrongWrite])
    }

    #[test]
    fn candidate_intents_weaken_ancestors() {
        let batch = WriteBatch::new().with(
            DocPath::from_strs(&["t", "r1", "c2"]),
            DocOperation::Put(vec![1]),
        );
        let map = candidate_intents(&batch);
        assert_eq!(map.len(), 3);
        assert_eq!(
            map[&DocPath::from_strs(&["t", "r1", "c2"])],
            strong_write()
        );
        let weak = IntentTypeSet::new(&[IntentType::WeakWrite]);
        assert_eq!(map[&DocPath::from_strs(&["t", "r1"])], weak);
        assert_eq!(map[&DocPath::from_strs(&["t"])], weak);
    }

    #[test]
    fn candidate_intents_merge_overlapping_paths() {
        let batch = WriteBatch::new()
            .with(DocPath::from_strs(&["t", "r1"]), DocOperation::ReadModify)
            .with(DocPath::from_strs(&["t"]), DocOperation::Delete);
        let map = candidate_intents(&batch);
        // "t" carries its own strong set plus the weak markers from "t/r1".
        let at_root = map[&DocPath::from_strs(&["t"])];
        assert!(at_root.contains(IntentType::StrongWrite));
        assert!(at_root.contains(IntentType::WeakRead));
        assert!(at_root.contains(IntentType::WeakWrite));
        let at_row = map[&DocPath::from_strs(&["t", "r1"])];
        assert!(at_row.contains(IntentType::StrongRead));
        assert!(at_row.contains(IntentType::StrongWrite));
    }

    #[test]
    fn empty_batch_has_no_candidate_intents() {
        assert!(candidate_intents(&WriteBatch::new()).is_empty());
    }
}
