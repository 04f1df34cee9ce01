//! In-memory row/range lock manager and lock batches.
//!
//! Locks are keyed by encoded document path and counted per intent type.
//! A [`LockState`] packs the holder count for each of the four intent
//! types into a 16-bit block, so a single atomic compare-and-swap admits
//! or rejects a whole [`IntentTypeSet`] against a key's current holders.
//!
//! A [`LockBatch`] is the caller-owned set of locks covering the document
//! paths one operation touches. The conflict resolver may ask for it to be
//! temporarily released while suspending on a wait queue, and restores it
//! before any success callback fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use riftdb_codec::{IntentType, IntentTypeSet, INTENT_TYPE_SET_COUNT};

use crate::error::{TxnError, TxnResult};

/// Packed per-key lock holder counts, one 16-bit block per intent type.
pub type LockState = u64;

/// Bits reserved per intent type. Four types fit a `u64` exactly.
const INTENT_TYPE_BITS: u32 = 16;

/// Mask selecting the least significant intent-type block.
const SINGLE_INTENT_MASK: LockState = (1 << INTENT_TYPE_BITS) - 1;

const fn intent_type_mask(type_index: u8, single_mask: LockState) -> LockState {
    single_mask << (type_index as u32 * INTENT_TYPE_BITS)
}

const fn type_is_write(type_index: u8) -> bool {
    type_index & 0b01 != 0
}

const fn type_is_strong(type_index: u8) -> bool {
    type_index & 0b10 != 0
}

const fn types_conflict(lhs: u8, rhs: u8) -> bool {
    (type_is_strong(lhs) || type_is_strong(rhs)) && (type_is_write(lhs) || type_is_write(rhs))
}

/// Per-type-set lock state tables, indexed by the set's byte value.
struct IntentTypeSetMap([LockState; INTENT_TYPE_SET_COUNT]);

/// For each type set: a mask matching any holder that conflicts with a
/// member of the set.
const CONFLICT_MASKS: IntentTypeSetMap = generate_conflict_masks();

/// For each type set: one count for each member, used to add or remove a
/// holder.
const ADD_MASKS: IntentTypeSetMap = generate_by_mask(1);

const fn generate_conflict_masks() -> IntentTypeSetMap {
    let mut result = [0; INTENT_TYPE_SET_COUNT];
    let mut set = 0usize;
    while set < INTENT_TYPE_SET_COUNT {
        let mut member = 0u8;
        while member < 4 {
            if set & (1 << member) != 0 {
                let mut other = 0u8;
                while other < 4 {
                    if types_conflict(member, other) {
                        result[set] |= intent_type_mask(other, SINGLE_INTENT_MASK);
                    }
                    other += 1;
                }
            }
            member += 1;
        }
        set += 1;
    }
    IntentTypeSetMap(result)
}

const fn generate_by_mask(single_mask: LockState) -> IntentTypeSetMap {
    let mut result = [0; INTENT_TYPE_SET_COUNT];
    let mut set = 0usize;
    while set < INTENT_TYPE_SET_COUNT {
        let mut member = 0u8;
        while member < 4 {
            if set & (1 << member) != 0 {
                result[set] |= intent_type_mask(member, single_mask);
            }
            member += 1;
        }
        set += 1;
    }
    IntentTypeSetMap(result)
}

/// Renders the intent types present in a lock state, for diagnostics.
#[must_use]
pub fn lock_state_to_string(state: LockState) -> String {
    let mut out = String::from("{");
    let mut first = true;
    for intent_type in IntentType::ALL {
        if state & intent_type_mask(intent_type as u8, SINGLE_INTENT_MASK) != 0 {
            if !first {
                out.push_str(", ");
            }
            first = false;
            out.push_str(&intent_type.to_string());
        }
    }
    out.push('}');
    out
}

/// Lock bookkeeping for one key.
#[derive(Debug, Default)]
struct LockedKeyEntry {
    /// Taken only for short duration around condvar waits.
    mutex: Mutex<()>,
    cond: Condvar,
    /// Packed holder counts per intent type.
    num_holding: AtomicU64,
    num_waiters: AtomicUsize,
}

impl LockedKeyEntry {
    #[must_use]
    fn lock(&self, types: IntentTypeSet, deadline: Instant) -> bool {
        let set_idx = types.as_byte() as usize;
        let conflict_mask = CONFLICT_MASKS.0[set_idx];
        let add = ADD_MASKS.0[set_idx];
        let mut old_state = self.num_holding.load(Ordering::Acquire);
        loop {
            if old_state & conflict_mask == 0 {
                match self.num_holding.compare_exchange_weak(
                    old_state,
                    old_state + add,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(current) => {
                        old_state = current;
                        continue;
                    }
                }
            }
            self.num_waiters.fetch_add(1, Ordering::Release);
            let mut guard = self.mutex.lock();
            old_state = self.num_holding.load(Ordering::Acquire);
            if old_state & conflict_mask != 0
                && self.cond.wait_until(&mut guard, deadline).timed_out()
            {
                drop(guard);
                self.num_waiters.fetch_sub(1, Ordering::Release);
                return false;
            }
            drop(guard);
            self.num_waiters.fetch_sub(1, Ordering::Release);
            old_state = self.num_holding.load(Ordering::Acquire);
        }
    }

    fn unlock(&self, types: IntentTypeSet) {
        let set_idx = types.as_byte() as usize;
        let sub = ADD_MASKS.0[set_idx];
        let new_state = self.num_holding.fetch_sub(sub, Ordering::AcqRel) - sub;

        if self.num_waiters.load(Ordering::Acquire) == 0 {
            return;
        }

        // Waiters can only make progress when some per-type count reaches
        // zero.
        let mut has_zero = false;
        for intent_type in types.iter() {
            if new_state & intent_type_mask(intent_type as u8, SINGLE_INTENT_MASK) == 0 {
                has_zero = true;
                break;
            }
        }
        if !has_zero {
            return;
        }

        // Lock/unlock the mutex as a barrier so we never notify between a
        // waiter's state check and its wait.
        drop(self.mutex.lock());
        self.cond.notify_all();
    }
}

#[derive(Debug)]
struct TrackedEntry {
    entry: Arc<LockedKeyEntry>,
    ref_count: usize,
}

/// Process-wide lock table shared by every operation on a tablet.
///
/// Entries are created on first reservation of a key and dropped when the
/// last referencing lock batch goes away.
#[derive(Debug, Default)]
pub struct SharedLockManager {
    locks: Mutex<HashMap<Bytes, TrackedEntry>>,
}

impl SharedLockManager {
    /// Creates an empty lock manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked; zero when no batch is alive.
    #[must_use]
    pub fn num_tracked_keys(&self) -> usize {
        self.locks.lock().len()
    }

    fn reserve(&self, keys: &[(Bytes, IntentTypeSet)]) -> Vec<Arc<LockedKeyEntry>> {
        let mut locks = self.locks.lock();
        keys.iter()
            .map(|(key, _)| {
                let tracked = locks.entry(key.clone()).or_insert_with(|| TrackedEntry {
                    entry: Arc::new(LockedKeyEntry::default()),
                    ref_count: 0,
                });
                tracked.ref_count += 1;
                Arc::clone(&tracked.entry)
            })
            .collect()
    }

    fn cleanup(&self, keys: &[(Bytes, IntentTypeSet)]) {
        let mut locks = self.locks.lock();
        for (key, _) in keys {
            if let Some(tracked) = locks.get_mut(key) {
                tracked.ref_count -= 1;
                if tracked.ref_count == 0 {
                    locks.remove(key);
                }
            }
        }
    }
}

/// A caller-owned batch of locks over the document paths one operation
/// touches.
///
/// Keys are locked in order and unlocked in reverse. The batch restores
/// its held state after a temporary release before the owning resolution
/// call can succeed.
pub struct LockBatch {
    manager: Arc<SharedLockManager>,
    keys: Vec<(Bytes, IntentTypeSet)>,
    entries: Vec<Arc<LockedKeyEntry>>,
    held: bool,
}

impl std::fmt::Debug for LockBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockBatch")
            .field("num_keys", &self.keys.len())
            .field("held", &self.held)
            .finish()
    }
}

impl LockBatch {
    /// Acquires locks for all `keys` against `manager`, blocking up to
    /// `deadline`.
    ///
    /// Keys are deduplicated by union-ing their type sets first, so one
    /// batch never self-conflicts.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if any key cannot be locked before the
    /// deadline; partially acquired keys are rolled back.
    pub fn acquire(
        manager: Arc<SharedLockManager>,
        keys: Vec<(Bytes, IntentTypeSet)>,
        deadline: Instant,
    ) -> TxnResult<Self> {
        let mut merged: HashMap<Bytes, IntentTypeSet> = HashMap::new();
        for (key, types) in keys {
            let entry = merged.entry(key).or_insert_with(IntentTypeSet::empty);
            *entry = entry.union(types);
        }
        let mut keys: Vec<_> = merged.into_iter().collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        let entries = manager.reserve(&keys);
        let mut batch = Self {
            manager,
            keys,
            entries,
            held: false,
        };
        batch.lock_all(deadline)?;
        Ok(batch)
    }

    /// Returns true while the batch holds its locks.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Returns the locked keys and their intent type sets.
    #[must_use]
    pub fn keys(&self) -> &[(Bytes, IntentTypeSet)] {
        &self.keys
    }

    /// Releases the locks while keeping the batch's reservations, returning
    /// a guard whose [`ReleasedLockBatch::reacquire`] restores the held
    /// state. Dropping the guard without calling `reacquire` restores it
    /// best-effort, so no exit path leaves the batch silently released.
    pub fn temporarily_release(&mut self) -> ReleasedLockBatch<'_> {
        trace!(num_keys = self.keys.len(), "releasing lock batch");
        self.unlock_all();
        ReleasedLockBatch {
            batch: self,
            restored: false,
        }
    }

    fn lock_all(&mut self, deadline: Instant) -> TxnResult<()> {
        debug_assert!(!self.held);
        for (idx, ((key, types), entry)) in self.keys.iter().zip(&self.entries).enumerate() {
            trace!(types = %types, key = ?key, "locking");
            if !entry.lock(*types, deadline) {
                for rollback in (0..idx).rev() {
                    self.entries[rollback].unlock(self.keys[rollback].1);
                }
                return Err(TxnError::timed_out("acquiring lock batch"));
            }
        }
        self.held = true;
        Ok(())
    }

    fn unlock_all(&mut self) {
        debug_assert!(self.held);
        for ((_, types), entry) in self.keys.iter().zip(&self.entries).rev() {
            entry.unlock(*types);
        }
        self.held = false;
    }
}

impl Drop for LockBatch {
    fn drop(&mut self) {
        if self.held {
            self.unlock_all();
        }
        self.manager.cleanup(&self.keys);
    }
}

/// Guard over a temporarily released [`LockBatch`].
pub struct ReleasedLockBatch<'a> {
    batch: &'a mut LockBatch,
    restored: bool,
}

impl ReleasedLockBatch<'_> {
    /// Re-acquires the batch's locks, blocking up to `deadline`.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the locks cannot be restored before the
    /// deadline; the batch is then left released and the caller must fail
    /// the resolution call.
    pub fn reacquire(mut self, deadline: Instant) -> TxnResult<()> {
        self.restored = true;
        self.batch.lock_all(deadline)
    }
}

impl Drop for ReleasedLockBatch<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        // Abandoned without an explicit reacquire (error or panic path).
        // Restore with an immediate deadline so callers observing
        // `is_held` stay consistent without blocking in drop.
        if self.batch.lock_all(Instant::now()).is_err() {
            warn!("failed to restore abandoned lock batch; leaving it released");
        }
    }
}
