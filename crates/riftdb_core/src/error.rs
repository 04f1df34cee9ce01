//! Error types for the conflict-resolution engine.

use thiserror::Error;

/// Result type for conflict-resolution operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors surfaced through the resolution callback.
///
/// Only terminal outcomes are externally visible; per-intent skip decisions
/// never escape the resolver. The variants are deliberately distinguishable
/// so callers can choose different retry and backoff policies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxnError {
    /// A malformed intent record was encountered. Fatal to the whole
    /// resolution call: it indicates store-level inconsistency.
    #[error("corruption: {0}")]
    Corruption(#[from] riftdb_codec::CodecError),

    /// A same-or-higher-priority pending transaction blocks the candidate
    /// and no wait queue is configured. Retryable.
    #[error("transaction conflict: {message}")]
    Conflict {
        /// Description of the blocking transaction.
        message: String,
    },

    /// The overall deadline elapsed while awaiting the oracle, the wait
    /// queue, or lock re-acquisition.
    #[error("deadline expired while {context}")]
    TimedOut {
        /// What the call was waiting on.
        context: String,
    },

    /// The status oracle could not answer for one or more transactions.
    /// Transient; retryable by the caller.
    #[error("transaction status oracle unavailable: {message}")]
    OracleUnavailable {
        /// Description of the oracle failure.
        message: String,
    },

    /// A precondition on the call's arguments was violated.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition.
        message: String,
    },
}

impl TxnError {
    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timed_out(context: impl Into<String>) -> Self {
        Self::TimedOut {
            context: context.into(),
        }
    }

    /// Create an oracle-unavailable error.
    pub fn oracle_unavailable(message: impl Into<String>) -> Self {
        Self::OracleUnavailable {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Returns true for failures the caller may retry (conflict, timeout,
    /// oracle unavailability), false for corruption and argument errors.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict { .. } | Self::TimedOut { .. } | Self::OracleUnavailable { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_split() {
        assert!(TxnError::conflict("t1 wins").is_retryable());
        assert!(TxnError::timed_out("waiting on oracle").is_retryable());
        assert!(TxnError::oracle_unavailable("network").is_retryable());
        assert!(!TxnError::invalid_argument("bad times").is_retryable());

        let corruption: TxnError = riftdb_codec::CodecError::corrupt_key("x", &[1]).into();
        assert!(!corruption.is_retryable());
    }
}
