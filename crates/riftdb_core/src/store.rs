//! Intent store read contract.
//!
//! The resolver consumes the intents region of the storage engine through
//! a narrow iteration contract; it never mutates it and does not own the
//! engine's iterator implementation.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::TxnResult;

/// A bounded scan over the intents key range, in key order.
pub type IntentScan<'a> = Box<dyn Iterator<Item = TxnResult<(Bytes, Bytes)>> + 'a>;

/// Read access to the intents region of the store.
///
/// Keys follow the binary layout defined by `riftdb_codec`; values carry
/// the owning transaction id followed by the provisional payload. The
/// intents region is read-only from the resolver's perspective.
///
/// # Implementors
///
/// - [`MemoryIntentStore`] - for tests and embedding
/// - the LSM engine's intents column family, outside this crate
pub trait IntentStore: Send + Sync {
    /// Returns an iterator over all intent records with `lower <= key <
    /// upper`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying engine cannot serve the scan.
    /// Individual items may also fail for engine-level read errors.
    fn scan_intents(&self, lower: &[u8], upper: &[u8]) -> TxnResult<IntentScan<'_>>;
}

/// An in-memory intent store backed by an ordered map.
///
/// Primarily for tests; also usable as the intents region of a fully
/// in-memory tablet.
#[derive(Debug, Default)]
pub struct MemoryIntentStore {
    records: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryIntentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces one intent record.
    pub fn insert_intent(&self, key: Vec<u8>, value: Vec<u8>) {
        self.records.write().insert(key, value);
    }

    /// Removes one intent record, returning true if it was present.
    pub fn remove_intent(&self, key: &[u8]) -> bool {
        self.records.write().remove(key).is_some()
    }

    /// Returns the number of stored intent records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no intents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl IntentStore for MemoryIntentStore {
    fn scan_intents(&self, lower: &[u8], upper: &[u8]) -> TxnResult<IntentScan<'_>> {
        if lower >= upper {
            return Ok(Box::new(std::iter::empty()));
        }
        let records = self.records.read();
        let items: Vec<_> = records
            .range(lower.to_vec()..upper.to_vec())
            .map(|(k, v)| Ok((Bytes::copy_from_slice(k), Bytes::copy_from_slice(v))))
            .collect();
        Ok(Box::new(items.into_iter()))
    }
}
