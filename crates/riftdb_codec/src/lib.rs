//! # RiftDB Codec
//!
//! Binary encoding and decoding of intent records for RiftDB.
//!
//! An intent is a provisional, not-yet-committed write recorded in the
//! intents region of the store, tagged with its owning transaction and the
//! hybrid time it was written at. This crate defines:
//!
//! - [`DocPath`] - hierarchical document paths with an order-preserving
//!   binary encoding
//! - [`IntentType`] / [`IntentTypeSet`] - the weak/strong, read/write
//!   access markers an operation asserts over a path
//! - [`HybridTime`] - the totally ordered logical timestamp domain
//! - intent key/value encoding, parsing, and debug rendering
//!   ([`encode_intent_key`], [`parse_intent_key`], [`debug_intent_key`])
//!
//! All decoding is strict: malformed input is a distinguishable corruption
//! error, never a silent skip, since it indicates store-level
//! inconsistency.

mod doc_path;
mod error;
mod hybrid_time;
mod intent;
mod key;
mod txn_id;

pub use doc_path::{DocPath, COMPONENT_TAG};
pub use error::{CodecError, CodecResult};
pub use hybrid_time::HybridTime;
pub use intent::{
    intent_types_conflict, IntentType, IntentTypeSet, INTENT_TYPE_SET_COUNT,
};
pub use key::{
    debug_intent_key, encode_intent_key, encode_intent_value, extract_transaction_id,
    intent_scan_bounds, parse_intent_key, ParsedIntent, HYBRID_TIME_MARKER, INTENT_PREFIX,
    INTENT_TYPE_SET_MARKER, TRANSACTION_ID_MARKER,
};
pub use txn_id::TransactionId;
