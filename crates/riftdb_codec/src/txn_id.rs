//! Transaction identifiers.

use std::fmt;

use uuid::Uuid;

/// Unique 16-byte identifier of a transaction.
///
/// Every intent value carries the id of its owning transaction.
/// Non-transactional operations have no id; their implicit owner is the
/// operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(Uuid);

impl TransactionId {
    /// Length of the serialized form in bytes.
    pub const LEN: usize = 16;

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Generates a fresh random id.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reconstructs an id from its serialized bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the serialized bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        self.0.as_bytes()
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip() {
        let id = TransactionId::random();
        assert_eq!(TransactionId::from_bytes(*id.as_bytes()), id);
    }

    #[test]
    fn display_is_prefixed() {
        let id = TransactionId::from_bytes([0; 16]);
        assert_eq!(
            format!("{id}"),
            "txn:00000000-0000-0000-0000-000000000000"
        );
    }
}
