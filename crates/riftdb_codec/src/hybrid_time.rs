//! Hybrid timestamps.
//!
//! A [`HybridTime`] is a totally ordered logical timestamp combining a
//! wall-clock reading (microseconds) with a logical counter. All ordering
//! decisions in conflict resolution are expressed in this domain, never in
//! raw wall time, so clock skew between nodes cannot reorder store events.

use std::fmt;

/// Number of low bits reserved for the logical counter.
const LOGICAL_BITS: u32 = 12;

/// Mask selecting the logical counter bits.
const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// A hybrid logical timestamp.
///
/// The raw representation packs physical microseconds into the high 52 bits
/// and a logical counter into the low 12 bits, so the derived ordering is
/// physical-first, logical-second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HybridTime(u64);

impl HybridTime {
    /// The smallest representable hybrid time.
    pub const MIN: HybridTime = HybridTime(0);

    /// The largest representable hybrid time.
    pub const MAX: HybridTime = HybridTime(u64::MAX);

    /// Creates a hybrid time from its raw packed representation.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Creates a hybrid time from physical microseconds with a zero
    /// logical counter.
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros << LOGICAL_BITS)
    }

    /// Creates a hybrid time from physical microseconds and a logical
    /// counter. The counter is truncated to 12 bits.
    #[must_use]
    pub const fn from_micros_and_logical(micros: u64, logical: u16) -> Self {
        Self((micros << LOGICAL_BITS) | (logical as u64 & LOGICAL_MASK))
    }

    /// Returns the raw packed representation.
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Returns the physical component in microseconds.
    #[must_use]
    pub const fn physical_micros(self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    /// Returns the logical counter component.
    #[must_use]
    pub const fn logical(self) -> u16 {
        (self.0 & LOGICAL_MASK) as u16
    }

    /// Returns the big-endian encoding used as an intent key suffix.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decodes a hybrid time from its big-endian key-suffix encoding.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl fmt::Display for HybridTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MIN {
            write!(f, "<min>")
        } else if *self == Self::MAX {
            write!(f, "<max>")
        } else {
            write!(f, "{{ physical: {} logical: {} }}", self.physical_micros(), self.logical())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_physical_and_logical() {
        let ht = HybridTime::from_micros_and_logical(1_000_000, 7);
        assert_eq!(ht.physical_micros(), 1_000_000);
        assert_eq!(ht.logical(), 7);
    }

    #[test]
    fn ordering_is_physical_first() {
        let a = HybridTime::from_micros_and_logical(100, 4095);
        let b = HybridTime::from_micros_and_logical(101, 0);
        assert!(a < b);
    }

    #[test]
    fn logical_breaks_ties() {
        let a = HybridTime::from_micros_and_logical(100, 1);
        let b = HybridTime::from_micros_and_logical(100, 2);
        assert!(a < b);
    }

    #[test]
    fn be_bytes_roundtrip_preserves_order() {
        let a = HybridTime::from_micros_and_logical(42, 3);
        let b = HybridTime::from_micros(43);
        assert_eq!(HybridTime::from_be_bytes(a.to_be_bytes()), a);
        assert!(a.to_be_bytes() < b.to_be_bytes());
    }

    #[test]
    fn display_bounds() {
        assert_eq!(format!("{}", HybridTime::MIN), "<min>");
        assert_eq!(format!("{}", HybridTime::MAX), "<max>");
        assert_eq!(
            format!("{}", HybridTime::from_micros_and_logical(5, 2)),
            "{ physical: 5 logical: 2 }"
        );
    }
}
