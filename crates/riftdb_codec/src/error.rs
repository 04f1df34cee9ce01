//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding intent data.
///
/// Every variant here indicates store-level corruption: a well-behaved
/// writer never produces input that fails to decode. Callers must surface
/// these as fatal data-integrity failures, never skip them silently.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An intent key failed to parse.
    #[error("corrupt intent key ({reason}): {key}")]
    CorruptIntentKey {
        /// What was wrong with the key.
        reason: String,
        /// Best-effort rendering of the offending key.
        key: String,
    },

    /// An intent value failed to parse.
    #[error("corrupt intent value ({reason}): {value}")]
    CorruptIntentValue {
        /// What was wrong with the value.
        reason: String,
        /// Hex rendering of the offending value prefix.
        value: String,
    },

    /// A document path failed to decode.
    #[error("corrupt document path: {message}")]
    CorruptDocPath {
        /// Description of the structural error.
        message: String,
    },

    /// Input ended before a complete item was decoded.
    #[error("unexpected end of input")]
    UnexpectedEof,
}

impl CodecError {
    /// Create a corrupt intent key error, rendering the key as hex.
    pub fn corrupt_key(reason: impl Into<String>, key: &[u8]) -> Self {
        Self::CorruptIntentKey {
            reason: reason.into(),
            key: hex_prefix(key, 64),
        }
    }

    /// Create a corrupt intent value error, rendering the value as hex.
    pub fn corrupt_value(reason: impl Into<String>, value: &[u8]) -> Self {
        Self::CorruptIntentValue {
            reason: reason.into(),
            value: hex_prefix(value, 32),
        }
    }

    /// Create a corrupt document path error.
    pub fn corrupt_path(message: impl Into<String>) -> Self {
        Self::CorruptDocPath {
            message: message.into(),
        }
    }
}

/// Render up to `limit` bytes as lowercase hex, with an ellipsis if truncated.
pub(crate) fn hex_prefix(bytes: &[u8], limit: usize) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(bytes.len().min(limit) * 2 + 2);
    for b in bytes.iter().take(limit) {
        let _ = write!(out, "{b:02x}");
    }
    if bytes.len() > limit {
        out.push_str("..");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_key_renders_hex() {
        let err = CodecError::corrupt_key("bad prefix", &[0xde, 0xad]);
        assert_eq!(
            format!("{err}"),
            "corrupt intent key (bad prefix): dead"
        );
    }

    #[test]
    fn hex_prefix_truncates() {
        let long = vec![0xab; 100];
        let rendered = hex_prefix(&long, 4);
        assert_eq!(rendered, "abababab..");
    }
}
