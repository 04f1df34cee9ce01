//! Property-based test generators using proptest.
//!
//! Strategies produce values that satisfy the invariants the engine
//! assumes: non-empty document paths, non-empty intent type sets, and
//! hybrid times whose physical component fits its 52 bits.

use proptest::prelude::*;

use riftdb_codec::{DocPath, HybridTime, IntentType, IntentTypeSet, TransactionId};
use riftdb_core::{DocOperation, WriteBatch};

/// Maximum physical-microseconds value representable in a hybrid time.
const MAX_PHYSICAL_MICROS: u64 = (1 << 52) - 1;

/// Strategy for a single path component: 1 to 8 arbitrary bytes,
/// including zero bytes so the escape path is exercised.
pub fn component_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=8)
}

/// Strategy for non-empty document paths with up to `max_components`
/// components.
pub fn doc_path_strategy(max_components: usize) -> impl Strategy<Value = DocPath> {
    prop::collection::vec(component_strategy(), 1..=max_components.max(1)).prop_map(DocPath::new)
}

/// Strategy for a single intent type.
pub fn intent_type_strategy() -> impl Strategy<Value = IntentType> {
    prop::sample::select(IntentType::ALL.to_vec())
}

/// Strategy for non-empty intent type sets.
pub fn intent_type_set_strategy() -> impl Strategy<Value = IntentTypeSet> {
    (1u8..16).prop_map(|byte| IntentTypeSet::from_byte(byte).expect("byte below 16"))
}

/// Strategy for hybrid times across the whole physical/logical domain.
pub fn hybrid_time_strategy() -> impl Strategy<Value = HybridTime> {
    (0..=MAX_PHYSICAL_MICROS, any::<u16>())
        .prop_map(|(micros, logical)| HybridTime::from_micros_and_logical(micros, logical & 0xfff))
}

/// Strategy for transaction ids.
pub fn transaction_id_strategy() -> impl Strategy<Value = TransactionId> {
    prop::array::uniform16(any::<u8>()).prop_map(TransactionId::from_bytes)
}

/// Strategy for a single document operation.
pub fn doc_operation_strategy() -> impl Strategy<Value = DocOperation> {
    prop_oneof![
        3 => prop::collection::vec(any::<u8>(), 0..64).prop_map(DocOperation::Put),
        1 => Just(DocOperation::Delete),
        1 => Just(DocOperation::ReadModify),
    ]
}

/// Strategy for non-empty write batches over shallow paths.
pub fn write_batch_strategy() -> impl Strategy<Value = WriteBatch> {
    prop::collection::vec((doc_path_strategy(3), doc_operation_strategy()), 1..6).prop_map(
        |entries| {
            let mut batch = WriteBatch::new();
            for (path, op) in entries {
                batch.push(path, op);
            }
            batch
        },
    )
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use riftdb_codec::{encode_intent_key, intent_scan_bounds, parse_intent_key};

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn path_ordering_matches_encoded_ordering(
            a in doc_path_strategy(4),
            b in doc_path_strategy(4),
        ) {
            prop_assert_eq!(a.cmp(&b), a.encode().cmp(&b.encode()));
        }

        #[test]
        fn ancestor_encoding_is_byte_prefix(path in doc_path_strategy(4)) {
            for ancestor in path.ancestors() {
                prop_assert!(path.encode().starts_with(&ancestor.encode()));
                prop_assert!(ancestor.is_ancestor_of(&path));
            }
        }

        #[test]
        fn intent_key_parses_back(
            path in doc_path_strategy(4),
            types in intent_type_set_strategy(),
            ht in hybrid_time_strategy(),
        ) {
            let key = encode_intent_key(&path, types, ht);
            let parsed = parse_intent_key(&key, &[]).unwrap();
            prop_assert_eq!(parsed.doc_path, path);
            prop_assert_eq!(parsed.types, types);
            prop_assert_eq!(parsed.doc_ht, ht);
        }

        #[test]
        fn scan_bounds_admit_exactly_the_path(
            path in doc_path_strategy(3),
            other in doc_path_strategy(3),
            types in intent_type_set_strategy(),
            ht in hybrid_time_strategy(),
        ) {
            let (lower, upper) = intent_scan_bounds(&path);
            let key = encode_intent_key(&other, types, ht);
            let in_bounds = key.as_slice() >= lower.as_slice() && key.as_slice() < upper.as_slice();
            prop_assert_eq!(in_bounds, other == path);
        }

        #[test]
        fn conflicts_are_symmetric(
            a in intent_type_set_strategy(),
            b in intent_type_set_strategy(),
        ) {
            prop_assert_eq!(a.conflicts_with(b), b.conflicts_with(a));
        }

        #[test]
        fn weak_markers_only_conflict_with_strong_access(
            a in intent_type_set_strategy(),
            b in intent_type_set_strategy(),
        ) {
            // Downgrading both sides to weak markers removes every conflict.
            prop_assert!(!a.to_weak().conflicts_with(b.to_weak()));
        }

        #[test]
        fn write_batches_have_candidate_paths(batch in write_batch_strategy()) {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.iter().all(|(_, ops)| !ops.is_empty()));
        }
    }
}
