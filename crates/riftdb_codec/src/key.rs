//! Intent key and value layout.
//!
//! An intent key is laid out as:
//!
//! ```text
//! 0x69 | encoded DocPath | 0x50 | type-set byte | 0x23 | 8-byte BE hybrid time
//! ```
//!
//! and an intent value as:
//!
//! ```text
//! 0x54 | 16-byte transaction id | provisional payload bytes
//! ```
//!
//! Path components always start with `0x24`, so the byte after the last
//! component unambiguously identifies the type-set marker, and the scan
//! range for exactly one path's intents never captures descendants.

use crate::doc_path::DocPath;
use crate::error::{hex_prefix, CodecError, CodecResult};
use crate::hybrid_time::HybridTime;
use crate::intent::IntentTypeSet;
use crate::txn_id::TransactionId;

/// First byte of every key in the intents region of the store.
pub const INTENT_PREFIX: u8 = 0x69;

/// Marker byte preceding the intent-type-set byte.
pub const INTENT_TYPE_SET_MARKER: u8 = 0x50;

/// Marker byte preceding the hybrid-time suffix.
pub const HYBRID_TIME_MARKER: u8 = 0x23;

/// Marker byte preceding the transaction id in an intent value.
pub const TRANSACTION_ID_MARKER: u8 = 0x54;

/// Length of the encoded hybrid-time suffix, marker included.
const HT_SUFFIX_LEN: usize = 1 + 8;

/// The decoded form of one on-disk intent record's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIntent {
    /// Document path the intent covers.
    pub doc_path: DocPath,
    /// Access markers the intent asserts.
    pub types: IntentTypeSet,
    /// Hybrid time the intent was written at. Always less than or equal to
    /// the resolution time under which it was written.
    pub doc_ht: HybridTime,
}

/// Encodes a full intent-store key.
#[must_use]
pub fn encode_intent_key(path: &DocPath, types: IntentTypeSet, ht: HybridTime) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + path.encode().len() + 2 + HT_SUFFIX_LEN);
    key.push(INTENT_PREFIX);
    path.encode_into(&mut key);
    key.push(INTENT_TYPE_SET_MARKER);
    key.push(types.as_byte());
    key.push(HYBRID_TIME_MARKER);
    key.extend_from_slice(&ht.to_be_bytes());
    key
}

/// Returns the `[lower, upper)` key bounds covering every intent recorded
/// for exactly `path`, across all type sets and hybrid times.
///
/// Descendant paths continue with a component tag after the shared prefix
/// and therefore fall outside the bounds.
#[must_use]
pub fn intent_scan_bounds(path: &DocPath) -> (Vec<u8>, Vec<u8>) {
    let mut lower = Vec::with_capacity(1 + path.encode().len() + 1);
    lower.push(INTENT_PREFIX);
    path.encode_into(&mut lower);
    lower.push(INTENT_TYPE_SET_MARKER);
    let mut upper = lower.clone();
    *upper.last_mut().unwrap_or(&mut 0) = INTENT_TYPE_SET_MARKER + 1;
    (lower, upper)
}

/// Parses a full intent-store key.
///
/// `txn_id_source` is a byte slice from which the owning transaction id can
/// additionally be recovered; it is only used to enrich error messages and
/// may be longer than 16 bytes.
///
/// # Errors
///
/// Returns a corruption error on a wrong prefix, malformed path, unknown
/// type-set byte, or truncated hybrid-time suffix. These indicate
/// store-level inconsistency and must never be silently skipped.
pub fn parse_intent_key(key: &[u8], txn_id_source: &[u8]) -> CodecResult<ParsedIntent> {
    let fail = |reason: String| -> CodecError {
        CodecError::corrupt_key(
            format!("{reason}; transaction: {}", hex_prefix(txn_id_source, 16)),
            key,
        )
    };

    let Some((&prefix, rest)) = key.split_first() else {
        return Err(fail("empty key".to_string()));
    };
    if prefix != INTENT_PREFIX {
        return Err(fail(format!("bad prefix byte {prefix:#04x}")));
    }

    let (doc_path, consumed) =
        DocPath::decode_prefix(rest).map_err(|e| fail(format!("bad path: {e}")))?;
    if doc_path.is_empty() {
        return Err(fail("empty document path".to_string()));
    }

    let tail = &rest[consumed..];
    if tail.len() != 2 + HT_SUFFIX_LEN {
        return Err(fail(format!("bad suffix length {}", tail.len())));
    }
    if tail[0] != INTENT_TYPE_SET_MARKER {
        return Err(fail(format!("bad type-set marker {:#04x}", tail[0])));
    }
    let types = IntentTypeSet::from_byte(tail[1])
        .filter(|set| !set.is_empty())
        .ok_or_else(|| fail(format!("bad type-set byte {:#04x}", tail[1])))?;
    if tail[2] != HYBRID_TIME_MARKER {
        return Err(fail(format!("bad hybrid-time marker {:#04x}", tail[2])));
    }

    let mut ht_bytes = [0u8; 8];
    ht_bytes.copy_from_slice(&tail[3..]);
    Ok(ParsedIntent {
        doc_path,
        types,
        doc_ht: HybridTime::from_be_bytes(ht_bytes),
    })
}

/// Encodes an intent value: the owning transaction id followed by the
/// provisional payload.
#[must_use]
pub fn encode_intent_value(txn_id: TransactionId, payload: &[u8]) -> Vec<u8> {
    let mut value = Vec::with_capacity(1 + TransactionId::LEN + payload.len());
    value.push(TRANSACTION_ID_MARKER);
    value.extend_from_slice(txn_id.as_bytes());
    value.extend_from_slice(payload);
    value
}

/// Extracts the owning transaction id from an intent value.
///
/// # Errors
///
/// Returns a corruption error if the value is too short or does not start
/// with the transaction-id marker.
pub fn extract_transaction_id(value: &[u8]) -> CodecResult<TransactionId> {
    let Some((&marker, rest)) = value.split_first() else {
        return Err(CodecError::corrupt_value("empty value", value));
    };
    if marker != TRANSACTION_ID_MARKER {
        return Err(CodecError::corrupt_value(
            format!("bad transaction-id marker {marker:#04x}"),
            value,
        ));
    }
    let Some(id_bytes) = rest.get(..TransactionId::LEN) else {
        return Err(CodecError::corrupt_value("truncated transaction id", value));
    };
    let mut bytes = [0u8; TransactionId::LEN];
    bytes.copy_from_slice(id_bytes);
    Ok(TransactionId::from_bytes(bytes))
}

/// Renders an intent key for logs and error messages.
///
/// Best effort: malformed keys fall back to raw hex instead of failing.
#[must_use]
pub fn debug_intent_key(key: &[u8]) -> String {
    match parse_intent_key(key, &[]) {
        Ok(parsed) => format!(
            "{} {} ht: {}",
            parsed.doc_path, parsed.types, parsed.doc_ht
        ),
        Err(_) => format!("<raw: {}>", hex_prefix(key, 64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::IntentType;

    fn sample_types() -> IntentTypeSet {
        IntentTypeSet::new(&[IntentType::StrongWrite])
    }

    #[test]
    fn encode_parse_roundtrip() {
        let path = DocPath::from_strs(&["t", "row1"]);
        let ht = HybridTime::from_micros_and_logical(42, 7);
        let key = encode_intent_key(&path, sample_types(), ht);
        let parsed = parse_intent_key(&key, &[]).unwrap();
        assert_eq!(parsed.doc_path, path);
        assert_eq!(parsed.types, sample_types());
        assert_eq!(parsed.doc_ht, ht);
    }

    #[test]
    fn scan_bounds_cover_exact_path_only() {
        let parent = DocPath::from_strs(&["t"]);
        let childpath = DocPath::from_strs(&["t", "r1"]);
        let (lower, upper) = intent_scan_bounds(&parent);

        let parent_key = encode_intent_key(&parent, sample_types(), HybridTime::from_micros(1));
        let child_key = encode_intent_key(&childpath, sample_types(), HybridTime::from_micros(1));

        assert!(parent_key.as_slice() >= lower.as_slice());
        assert!(parent_key.as_slice() < upper.as_slice());
        assert!(!(child_key.as_slice() >= lower.as_slice() && child_key.as_slice() < upper.as_slice()));
    }

    #[test]
    fn rejects_wrong_prefix() {
        let path = DocPath::from_strs(&["t"]);
        let mut key = encode_intent_key(&path, sample_types(), HybridTime::from_micros(1));
        key[0] = 0x70;
        assert!(matches!(
            parse_intent_key(&key, &[]),
            Err(CodecError::CorruptIntentKey { .. })
        ));
    }

    #[test]
    fn rejects_truncated_hybrid_time() {
        let path = DocPath::from_strs(&["t"]);
        let mut key = encode_intent_key(&path, sample_types(), HybridTime::from_micros(1));
        key.truncate(key.len() - 3);
        assert!(matches!(
            parse_intent_key(&key, &[]),
            Err(CodecError::CorruptIntentKey { .. })
        ));
    }

    #[test]
    fn rejects_empty_type_set() {
        let path = DocPath::from_strs(&["t"]);
        let mut key = encode_intent_key(&path, sample_types(), HybridTime::from_micros(1));
        let set_pos = key.len() - HT_SUFFIX_LEN - 1;
        key[set_pos] = 0;
        assert!(parse_intent_key(&key, &[]).is_err());
        key[set_pos] = 16;
        assert!(parse_intent_key(&key, &[]).is_err());
    }

    #[test]
    fn error_mentions_transaction_source() {
        let err = parse_intent_key(&[0x00], &[0xaa, 0xbb]).unwrap_err();
        assert!(format!("{err}").contains("aabb"));
    }

    #[test]
    fn value_roundtrip() {
        let id = TransactionId::random();
        let value = encode_intent_value(id, b"payload");
        assert_eq!(extract_transaction_id(&value).unwrap(), id);
    }

    #[test]
    fn value_rejects_truncation() {
        let id = TransactionId::random();
        let mut value = encode_intent_value(id, &[]);
        value.truncate(8);
        assert!(matches!(
            extract_transaction_id(&value),
            Err(CodecError::CorruptIntentValue { .. })
        ));
        assert!(extract_transaction_id(&[]).is_err());
        assert!(extract_transaction_id(&[0x99]).is_err());
    }

    #[test]
    fn debug_rendering_never_fails() {
        let path = DocPath::from_strs(&["users", "42"]);
        let key = encode_intent_key(&path, sample_types(), HybridTime::from_micros(5));
        let rendered = debug_intent_key(&key);
        assert!(rendered.contains("/users/42"));
        assert!(rendered.contains("strong-write"));

        let garbage = debug_intent_key(&[0xff, 0x00, 0x13]);
        assert!(garbage.contains("ff0013"));
    }
}
