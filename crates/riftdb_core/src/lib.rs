//! # RiftDB Core
//!
//! Transactional conflict-resolution engine for RiftDB.
//!
//! Before a write batch may be applied, its provisional intents are
//! checked against every intent already recorded in the store. This crate
//! provides:
//!
//! - [`ConflictResolver`] - the scan/classify/decide engine for
//!   transactional and single-operation write batches
//! - [`SharedLockManager`] / [`LockBatch`] - in-memory row and range
//!   locks keyed by encoded document path
//! - [`WaitQueue`] - the pessimistic suspension primitive, with a
//!   process-local [`InMemoryWaitQueue`]
//! - [`TransactionStatusOracle`] - the authority on transaction status,
//!   commit times, and abort requests
//! - [`IntentStore`] - read access to the intents region of the storage
//!   engine, with an in-memory implementation for tests and embedding
//!
//! Binary intent layout and the hybrid-time and intent-type domains live
//! in `riftdb_codec`.

pub mod config;
pub mod error;
pub mod lock_manager;
pub mod oracle;
pub mod resolver;
pub mod stats;
pub mod store;
pub mod types;
pub mod wait_queue;

pub use config::ResolverConfig;
pub use error::{TxnError, TxnResult};
pub use lock_manager::{
    lock_state_to_string, LockBatch, LockState, ReleasedLockBatch, SharedLockManager,
};
pub use oracle::{
    AbortOutcome, TransactionStatus, TransactionStatusOracle, TransactionStatusRecord,
};
pub use resolver::{ConflictResolver, ResolutionCallback, ResolutionStrategy};
pub use stats::ResolverStats;
pub use store::{IntentScan, IntentStore, MemoryIntentStore};
pub use types::{DocOperation, TransactionMeta, WriteBatch};
pub use wait_queue::{BlockerInfo, InMemoryWaitQueue, WaitEntry, WaitQueue};
