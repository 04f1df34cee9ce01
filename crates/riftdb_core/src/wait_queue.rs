//! Pessimistic blocking wait queue.
//!
//! In pessimistic mode the resolver suspends on a wait queue instead of
//! rejecting the candidate when a same-or-higher-priority transaction
//! holds a conflicting intent. The queue is keyed by document path and
//! intent types and wakes the waiter once every blocking transaction
//! resolves (commits, aborts, or releases the conflicting lock).
//!
//! Optimistic mode never consults a wait queue; it is a first-class
//! configuration, not a degraded fallback.

use std::collections::HashSet;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use riftdb_codec::{IntentTypeSet, TransactionId};

use crate::error::{TxnError, TxnResult};

/// One conflicting key the waiter is blocked on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitEntry {
    /// Encoded document path of the conflicting intent.
    pub key: Bytes,
    /// Intent types in conflict at that key.
    pub types: IntentTypeSet,
}

/// A transaction blocking the waiter, with the keys it blocks on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockerInfo {
    /// The blocking transaction.
    pub id: TransactionId,
    /// Conflicting keys and intent types.
    pub entries: Vec<WaitEntry>,
}

/// Blocking primitive that suspends a caller until conflicting
/// transactions resolve.
///
/// Implementations must honor `deadline` as a cancellation bound: a waiter
/// is released with a timeout failure rather than held indefinitely.
pub trait WaitQueue: Send + Sync {
    /// Suspends the caller until every transaction in `blockers` has
    /// resolved or `deadline` elapses.
    ///
    /// `waiter` identifies the suspended transaction for diagnostics and
    /// deadlock analysis; it is `None` for non-transactional operations.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the deadline elapses first.
    fn wait_on(
        &self,
        waiter: Option<TransactionId>,
        blockers: &[BlockerInfo],
        deadline: Instant,
    ) -> TxnResult<()>;
}

/// A process-local wait queue driven by explicit resolution notifications.
///
/// Whoever applies or cleans up a transaction's intents calls
/// [`notify_resolved`](Self::notify_resolved); waiters wake when all of
/// their blockers have been notified.
#[derive(Debug, Default)]
pub struct InMemoryWaitQueue {
    resolved: Mutex<HashSet<TransactionId>>,
    cond: Condvar,
}

impl InMemoryWaitQueue {
    /// Creates an empty wait queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a transaction has resolved and wakes waiters blocked
    /// on it.
    pub fn notify_resolved(&self, id: TransactionId) {
        debug!(%id, "transaction resolved, waking waiters");
        self.resolved.lock().insert(id);
        self.cond.notify_all();
    }

    /// Drops resolution records no longer referenced by any waiter.
    /// Callers invoke this periodically; the queue itself keeps records
    /// until told otherwise.
    pub fn forget_resolved(&self, id: TransactionId) {
        self.resolved.lock().remove(&id);
    }
}

impl WaitQueue for InMemoryWaitQueue {
    fn wait_on(
        &self,
        waiter: Option<TransactionId>,
        blockers: &[BlockerInfo],
        deadline: Instant,
    ) -> TxnResult<()> {
        let mut resolved = self.resolved.lock();
        loop {
            let pending: Vec<_> = blockers
                .iter()
                .filter(|b| !resolved.contains(&b.id))
                .map(|b| b.id)
                .collect();
            if pending.is_empty() {
                return Ok(());
            }
            trace!(?waiter, blocked_on = pending.len(), "suspending on wait queue");
            if self.cond.wait_until(&mut resolved, deadline).timed_out() {
                return Err(TxnError::timed_out("suspended on wait queue"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn blocker(id: TransactionId) -> BlockerInfo {
        BlockerInfo {
            id,
            entries: vec![WaitEntry {
                key: Bytes::from_static(b"k"),
                types: IntentTypeSet::empty(),
            }],
        }
    }

    #[test]
    fn returns_immediately_when_blockers_already_resolved() {
        let queue = InMemoryWaitQueue::new();
        let id = TransactionId::random();
        queue.notify_resolved(id);
        queue
            .wait_on(None, &[blocker(id)], Instant::now() + Duration::from_secs(1))
            .unwrap();
    }

    #[test]
    fn times_out_when_blocker_stays_pending() {
        let queue = InMemoryWaitQueue::new();
        let result = queue.wait_on(
            Some(TransactionId::random()),
            &[blocker(TransactionId::random())],
            Instant::now() + Duration::from_millis(20),
        );
        assert!(matches!(result, Err(TxnError::TimedOut { .. })));
    }

    #[test]
    fn wakes_when_all_blockers_resolve() {
        let queue = Arc::new(InMemoryWaitQueue::new());
        let a = TransactionId::random();
        let b = TransactionId::random();

        let queue2 = Arc::clone(&queue);
        let waiter = std::thread::spawn(move || {
            queue2.wait_on(
                None,
                &[blocker(a), blocker(b)],
                Instant::now() + Duration::from_secs(5),
            )
        });

        std::thread::sleep(Duration::from_millis(10));
        queue.notify_resolved(a);
        std::thread::sleep(Duration::from_millis(10));
        queue.notify_resolved(b);
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn forget_resolved_removes_record() {
        let queue = InMemoryWaitQueue::new();
        let id = TransactionId::random();
        queue.notify_resolved(id);
        queue.forget_resolved(id);
        let result = queue.wait_on(
            None,
            &[blocker(id)],
            Instant::now() + Duration::from_millis(10),
        );
        assert!(result.is_err());
    }
}
