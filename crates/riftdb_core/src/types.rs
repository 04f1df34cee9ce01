//! Core type definitions for the conflict-resolution engine.

use std::collections::BTreeMap;

use riftdb_codec::{DocPath, IntentType, IntentTypeSet, TransactionId};

/// Identity and conflict priority of the transaction on whose behalf a
/// resolution call runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionMeta {
    /// Owning transaction id.
    pub id: TransactionId,
    /// Conflict priority. A pending transaction with strictly lower
    /// priority than the candidate is aborted; ties block or reject the
    /// candidate.
    pub priority: u64,
}

impl TransactionMeta {
    /// Creates transaction metadata.
    #[must_use]
    pub const fn new(id: TransactionId, priority: u64) -> Self {
        Self { id, priority }
    }
}

/// One sub-operation a write batch intends to apply at a document path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocOperation {
    /// Insert or replace the value at the path.
    Put(Vec<u8>),
    /// Remove the value at the path.
    Delete,
    /// Read the current value, then write a derived one.
    ReadModify,
}

impl DocOperation {
    /// Returns the intent types this operation asserts on its exact path.
    #[must_use]
    pub fn intent_types(&self) -> IntentTypeSet {
        match self {
            DocOperation::Put(_) | DocOperation::Delete => {
                IntentTypeSet::new(&[IntentType::StrongWrite])
            }
            DocOperation::ReadModify => {
                IntentTypeSet::new(&[IntentType::StrongRead, IntentType::StrongWrite])
            }
        }
    }
}

/// An ordered mapping from document path to the sub-operations a
/// higher-level operation intends to apply there.
///
/// Supplied by the tablet write path; the resolver only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    entries: BTreeMap<DocPath, Vec<DocOperation>>,
}

impl WriteBatch {
    /// Creates an empty write batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sub-operation at a path.
    pub fn push(&mut self, path: DocPath, op: DocOperation) {
        self.entries.entry(path).or_default().push(op);
    }

    /// Builder-style [`push`](Self::push).
    #[must_use]
    pub fn with(mut self, path: DocPath, op: DocOperation) -> Self {
        self.push(path, op);
        self
    }

    /// Iterates over entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocPath, &[DocOperation])> {
        self.entries.iter().map(|(p, ops)| (p, ops.as_slice()))
    }

    /// Returns true if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of distinct paths touched.
    #[must_use]
    pub fn num_paths(&self) -> usize {
        self.entries.len()
    }
}
