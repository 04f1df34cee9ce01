//! Intent types and intent type sets.
//!
//! Every intent asserts a combination of weak/strong, read/write access
//! markers over one document path. A strong intent covers exactly its path;
//! a weak intent marks an ancestor path so that range operations on the
//! ancestor can detect activity below it.

use std::fmt;

/// Bit set in the discriminant of write intent types.
const WRITE_FLAG: u8 = 0b01;

/// Bit set in the discriminant of strong intent types.
const STRONG_FLAG: u8 = 0b10;

/// Number of distinct intent type sets (subsets of the four types).
pub const INTENT_TYPE_SET_COUNT: usize = 16;

/// One access marker over a document path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IntentType {
    /// Shared marker on an ancestor of a read path.
    WeakRead = 0,
    /// Shared marker on an ancestor of a written path.
    WeakWrite = 1,
    /// Read of exactly this path.
    StrongRead = 2,
    /// Write of exactly this path.
    StrongWrite = 3,
}

impl IntentType {
    /// All intent types, in discriminant order.
    pub const ALL: [IntentType; 4] = [
        IntentType::WeakRead,
        IntentType::WeakWrite,
        IntentType::StrongRead,
        IntentType::StrongWrite,
    ];

    /// Returns true for write intent types.
    #[must_use]
    pub const fn is_write(self) -> bool {
        self as u8 & WRITE_FLAG != 0
    }

    /// Returns true for strong intent types.
    #[must_use]
    pub const fn is_strong(self) -> bool {
        self as u8 & STRONG_FLAG != 0
    }

    /// Returns the weak counterpart of a strong type; weak types map to
    /// themselves.
    #[must_use]
    pub const fn to_weak(self) -> Self {
        match self {
            IntentType::StrongRead => IntentType::WeakRead,
            IntentType::StrongWrite => IntentType::WeakWrite,
            other => other,
        }
    }

    /// Reconstructs an intent type from its discriminant.
    #[must_use]
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(IntentType::WeakRead),
            1 => Some(IntentType::WeakWrite),
            2 => Some(IntentType::StrongRead),
            3 => Some(IntentType::StrongWrite),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            IntentType::WeakRead => "weak-read",
            IntentType::WeakWrite => "weak-write",
            IntentType::StrongRead => "strong-read",
            IntentType::StrongWrite => "strong-write",
        }
    }
}

/// Returns true if two intent types are incompatible on overlapping paths.
///
/// Two types conflict iff at least one is strong and at least one is a
/// write. Read/read never conflicts, and two weak markers never conflict
/// (they only record activity below a shared ancestor).
#[must_use]
pub const fn intent_types_conflict(lhs: IntentType, rhs: IntentType) -> bool {
    (lhs.is_strong() || rhs.is_strong()) && (lhs.is_write() || rhs.is_write())
}

impl fmt::Display for IntentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A small bitset of [`IntentType`]s asserted over one document path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IntentTypeSet(u8);

impl IntentTypeSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a set from a slice of types.
    #[must_use]
    pub fn new(types: &[IntentType]) -> Self {
        let mut set = Self::empty();
        for &t in types {
            set = set.with(t);
        }
        set
    }

    /// Reconstructs a set from its byte representation.
    ///
    /// Returns `None` if the byte has bits outside the four type bits.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte as usize >= INTENT_TYPE_SET_COUNT {
            None
        } else {
            Some(Self(byte))
        }
    }

    /// Returns the byte representation (low four bits).
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Returns this set with `intent_type` added.
    #[must_use]
    pub const fn with(self, intent_type: IntentType) -> Self {
        Self(self.0 | 1 << intent_type as u8)
    }

    /// Returns the union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Returns true if `intent_type` is a member.
    #[must_use]
    pub const fn contains(self, intent_type: IntentType) -> bool {
        self.0 & (1 << intent_type as u8) != 0
    }

    /// Returns true for the empty set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates over the members in discriminant order.
    pub fn iter(self) -> impl Iterator<Item = IntentType> {
        IntentType::ALL.into_iter().filter(move |t| self.contains(*t))
    }

    /// Returns the set with every strong member replaced by its weak
    /// counterpart. Used to derive ancestor intents from a strong set.
    #[must_use]
    pub fn to_weak(self) -> Self {
        let mut set = Self::empty();
        for t in self.iter() {
            set = set.with(t.to_weak());
        }
        set
    }

    /// Returns true if any member of `self` conflicts with any member of
    /// `other`. Symmetric by construction.
    #[must_use]
    pub fn conflicts_with(self, other: Self) -> bool {
        self.iter()
            .any(|lhs| other.iter().any(|rhs| intent_types_conflict(lhs, rhs)))
    }
}

impl FromIterator<IntentType> for IntentTypeSet {
    fn from_iter<I: IntoIterator<Item = IntentType>>(iter: I) -> Self {
        let mut set = Self::empty();
        for t in iter {
            set = set.with(t);
        }
        set
    }
}

impl fmt::Display for IntentTypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for t in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{t}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sets() -> impl Iterator<Item = IntentTypeSet> {
        (0..INTENT_TYPE_SET_COUNT as u8).map(|b| IntentTypeSet::from_byte(b).unwrap())
    }

    #[test]
    fn flags_match_discriminants() {
        assert!(!IntentType::WeakRead.is_write());
        assert!(!IntentType::WeakRead.is_strong());
        assert!(IntentType::WeakWrite.is_write());
        assert!(IntentType::StrongRead.is_strong());
        assert!(IntentType::StrongWrite.is_write() && IntentType::StrongWrite.is_strong());
    }

    #[test]
    fn reads_never_conflict() {
        assert!(!intent_types_conflict(
            IntentType::StrongRead,
            IntentType::StrongRead
        ));
        assert!(!intent_types_conflict(
            IntentType::StrongRead,
            IntentType::WeakRead
        ));
    }

    #[test]
    fn writes_conflict_with_strong_access() {
        assert!(intent_types_conflict(
            IntentType::StrongWrite,
            IntentType::StrongWrite
        ));
        assert!(intent_types_conflict(
            IntentType::StrongWrite,
            IntentType::WeakRead
        ));
        assert!(intent_types_conflict(
            IntentType::WeakWrite,
            IntentType::StrongRead
        ));
    }

    #[test]
    fn weak_markers_never_conflict_with_each_other() {
        assert!(!intent_types_conflict(
            IntentType::WeakWrite,
            IntentType::WeakWrite
        ));
        assert!(!intent_types_conflict(
            IntentType::WeakWrite,
            IntentType::WeakRead
        ));
    }

    #[test]
    fn set_conflicts_are_symmetric() {
        for lhs in all_sets() {
            for rhs in all_sets() {
                assert_eq!(lhs.conflicts_with(rhs), rhs.conflicts_with(lhs));
            }
        }
    }

    #[test]
    fn empty_set_conflicts_with_nothing() {
        for set in all_sets() {
            assert!(!IntentTypeSet::empty().conflicts_with(set));
        }
    }

    #[test]
    fn to_weak_downgrades_strong_members() {
        let strong = IntentTypeSet::new(&[IntentType::StrongRead, IntentType::StrongWrite]);
        let weak = strong.to_weak();
        assert!(weak.contains(IntentType::WeakRead));
        assert!(weak.contains(IntentType::WeakWrite));
        assert!(!weak.contains(IntentType::StrongRead));
        assert!(!weak.contains(IntentType::StrongWrite));
    }

    #[test]
    fn byte_roundtrip() {
        for set in all_sets() {
            assert_eq!(IntentTypeSet::from_byte(set.as_byte()), Some(set));
        }
        assert_eq!(IntentTypeSet::from_byte(16), None);
    }

    #[test]
    fn display_lists_members() {
        let set = IntentTypeSet::new(&[IntentType::WeakRead, IntentType::StrongWrite]);
        assert_eq!(format!("{set}"), "{weak-read, strong-write}");
    }
}
