//! Transaction status oracle interface.
//!
//! The oracle is the authority on whether a transaction is pending,
//! committed, or aborted, and at what time and priority. The resolver
//! treats it as potentially slow or remote: lookups are batched, bounded
//! by the caller's deadline, and never performed while the lock batch is
//! released outside the wait-queue suspension path.

use std::time::Instant;

use riftdb_codec::{HybridTime, TransactionId};

use crate::error::TxnResult;

/// Status of a transaction as of some hybrid time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Still in flight; its intents are live.
    Pending,
    /// Committed at the contained hybrid time; its intents are being
    /// promoted to regular records.
    Committed(HybridTime),
    /// Aborted; its intents are defunct and awaiting cleanup.
    Aborted,
}

impl TransactionStatus {
    /// Returns the commit time for committed transactions.
    #[must_use]
    pub fn commit_time(&self) -> Option<HybridTime> {
        match self {
            TransactionStatus::Committed(ht) => Some(*ht),
            _ => None,
        }
    }
}

/// One oracle answer: the status and priority of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStatusRecord {
    /// The transaction the record describes.
    pub id: TransactionId,
    /// Status as of the requested time.
    pub status: TransactionStatus,
    /// Conflict priority assigned at transaction start.
    pub priority: u64,
}

/// Result of an abort request.
///
/// An abort request can lose the race: by the time it is processed the
/// target may have committed. The requester must re-classify the target
/// from this outcome rather than assume the abort took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortOutcome {
    /// The target's status after the request was processed.
    pub status: TransactionStatus,
}

/// Authority answering transaction status questions and accepting abort
/// requests.
///
/// # Contract
///
/// - `get_statuses` is batch-friendly; callers coalesce concurrently
///   discovered transaction ids into as few round-trips as possible.
/// - Both operations are synchronous round-trips bounded by `deadline`;
///   implementations surface `TxnError::TimedOut` when it elapses and
///   `TxnError::OracleUnavailable` for transient failures.
/// - Abort requests are best-effort and never retracted.
pub trait TransactionStatusOracle: Send + Sync {
    /// Returns one status record per requested id, in request order.
    ///
    /// # Errors
    ///
    /// Returns an error if the oracle cannot answer for one or more of the
    /// requested transactions before the deadline.
    fn get_statuses(
        &self,
        ids: &[TransactionId],
        as_of: HybridTime,
        deadline: Instant,
    ) -> TxnResult<Vec<TransactionStatusRecord>>;

    /// Requests that a transaction be aborted, reporting its state after
    /// the request was processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be delivered before the
    /// deadline.
    fn request_abort(&self, id: TransactionId, deadline: Instant) -> TxnResult<AbortOutcome>;
}
