//! Hierarchical document paths.
//!
//! A [`DocPath`] identifies a row, column, or sub-document range as an
//! ordered list of byte-string components. The binary encoding preserves
//! component boundaries: an encoded path is a byte prefix of the encoding
//! of every descendant path, which is what lets range intents on an
//! ancestor detect operations on its descendants.

use std::fmt;

use crate::error::{CodecError, CodecResult};

/// Tag byte that starts every encoded path component.
pub const COMPONENT_TAG: u8 = 0x24;

/// Escape byte inside component payloads (`0x00` becomes `0x00 0x01`).
const ESCAPE: u8 = 0x00;

/// Second byte of the component terminator (`0x00 0x00`).
const TERMINATOR: u8 = 0x00;

/// Second byte of an escaped zero (`0x00 0x01`).
const ESCAPED_ZERO: u8 = 0x01;

/// A hierarchical document path.
///
/// Ordering is component-wise lexicographic, which coincides with the
/// byte ordering of the encoded form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocPath {
    components: Vec<Vec<u8>>,
}

impl DocPath {
    /// Creates a path from raw components. At least one component is
    /// required for a path that can appear in an intent key.
    #[must_use]
    pub fn new(components: Vec<Vec<u8>>) -> Self {
        Self { components }
    }

    /// Creates a single-component path.
    #[must_use]
    pub fn single(component: impl Into<Vec<u8>>) -> Self {
        Self {
            components: vec![component.into()],
        }
    }

    /// Creates a path from string components, for tests and diagnostics.
    #[must_use]
    pub fn from_strs(components: &[&str]) -> Self {
        Self {
            components: components.iter().map(|c| c.as_bytes().to_vec()).collect(),
        }
    }

    /// Returns the path components.
    #[must_use]
    pub fn components(&self) -> &[Vec<u8>] {
        &self.components
    }

    /// Returns the number of components.
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.components.len()
    }

    /// Returns true for the empty path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns this path extended by one component.
    #[must_use]
    pub fn child(&self, component: impl Into<Vec<u8>>) -> Self {
        let mut components = self.components.clone();
        components.push(component.into());
        Self { components }
    }

    /// Returns the parent path, or `None` for paths with at most one
    /// component.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.components.len() < 2 {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Returns every proper ancestor of this path, shortest first.
    ///
    /// A path with a single component has no ancestors.
    pub fn ancestors(&self) -> impl Iterator<Item = DocPath> + '_ {
        (1..self.components.len()).map(move |len| DocPath {
            components: self.components[..len].to_vec(),
        })
    }

    /// Returns true if `self` is a proper prefix of `other`.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &DocPath) -> bool {
        self.components.len() < other.components.len()
            && other.components[..self.components.len()] == self.components[..]
    }

    /// Encodes this path into its binary form.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf
    }

    /// Appends the binary encoding of this path to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        for component in &self.components {
            buf.push(COMPONENT_TAG);
            for &b in component {
                if b == ESCAPE {
                    buf.push(ESCAPE);
                    buf.push(ESCAPED_ZERO);
                } else {
                    buf.push(b);
                }
            }
            buf.push(ESCAPE);
            buf.push(TERMINATOR);
        }
    }

    /// Decodes a path from its complete binary encoding.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the input is not exactly one valid
    /// encoded path.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let (path, consumed) = Self::decode_prefix(bytes)?;
        if consumed != bytes.len() {
            return Err(CodecError::corrupt_path("trailing bytes after path"));
        }
        Ok(path)
    }

    /// Decodes the longest run of encoded components from the front of
    /// `bytes`, returning the path and the number of bytes consumed.
    ///
    /// Stops at the first byte that does not start a component, which is
    /// how intent-key parsing locates the marker that follows the path.
    ///
    /// # Errors
    ///
    /// Returns a corruption error on a truncated or mis-escaped component.
    pub fn decode_prefix(bytes: &[u8]) -> CodecResult<(Self, usize)> {
        let mut components = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() && bytes[pos] == COMPONENT_TAG {
            pos += 1;
            let mut component = Vec::new();
            loop {
                let Some(&b) = bytes.get(pos) else {
                    return Err(CodecError::UnexpectedEof);
                };
                pos += 1;
                if b != ESCAPE {
                    component.push(b);
                    continue;
                }
                let Some(&next) = bytes.get(pos) else {
                    return Err(CodecError::UnexpectedEof);
                };
                pos += 1;
                match next {
                    TERMINATOR => break,
                    ESCAPED_ZERO => component.push(0),
                    other => {
                        return Err(CodecError::corrupt_path(format!(
                            "invalid escape byte {other:#04x}"
                        )))
                    }
                }
            }
            components.push(component);
        }
        Ok((Self { components }, pos))
    }

    fn encoded_len(&self) -> usize {
        // Tag + terminator per component, plus payload without escapes.
        self.components.iter().map(|c| c.len() + 3).sum()
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            match std::str::from_utf8(component) {
                Ok(s) if s.chars().all(|c| !c.is_control()) => write!(f, "/{s}")?,
                _ => write!(f, "/0x{}", crate::error::hex_prefix(component, 16))?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let path = DocPath::from_strs(&["table", "row1", "col"]);
        let decoded = DocPath::decode(&path.encode()).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn zero_bytes_are_escaped() {
        let path = DocPath::new(vec![vec![0x00, 0x41, 0x00]]);
        let encoded = path.encode();
        assert_eq!(
            encoded,
            vec![0x24, 0x00, 0x01, 0x41, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(DocPath::decode(&encoded).unwrap(), path);
    }

    #[test]
    fn ancestor_encoding_is_byte_prefix() {
        let parent = DocPath::from_strs(&["t"]);
        let childpath = DocPath::from_strs(&["t", "r1"]);
        let parent_enc = parent.encode();
        let child_enc = childpath.encode();
        assert!(child_enc.starts_with(&parent_enc));
        assert!(parent.is_ancestor_of(&childpath));
        assert!(!childpath.is_ancestor_of(&parent));
    }

    #[test]
    fn ancestors_shortest_first() {
        let path = DocPath::from_strs(&["a", "b", "c"]);
        let ancestors: Vec<_> = path.ancestors().collect();
        assert_eq!(
            ancestors,
            vec![DocPath::from_strs(&["a"]), DocPath::from_strs(&["a", "b"])]
        );
        assert!(DocPath::from_strs(&["a"]).ancestors().next().is_none());
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut encoded = DocPath::from_strs(&["t"]).encode();
        encoded.pop();
        assert!(matches!(
            DocPath::decode(&encoded),
            Err(CodecError::UnexpectedEof)
        ));
    }

    #[test]
    fn decode_rejects_bad_escape() {
        // 0x00 followed by 0x7f is neither a terminator nor an escaped zero.
        let encoded = vec![0x24, 0x41, 0x00, 0x7f];
        assert!(matches!(
            DocPath::decode(&encoded),
            Err(CodecError::CorruptDocPath { .. })
        ));
    }

    #[test]
    fn ordering_matches_encoded_ordering() {
        let paths = vec![
            DocPath::from_strs(&["a"]),
            DocPath::from_strs(&["a", "b"]),
            DocPath::from_strs(&["ab"]),
            DocPath::new(vec![b"a\x00".to_vec()]),
        ];
        let mut by_component = paths.clone();
        by_component.sort();
        let mut by_encoding = paths;
        by_encoding.sort_by(|a, b| a.encode().cmp(&b.encode()));
        assert_eq!(by_component, by_encoding);
    }

    #[test]
    fn display_falls_back_to_hex() {
        let path = DocPath::new(vec![b"users".to_vec(), vec![0x00, 0xff]]);
        assert_eq!(format!("{path}"), "/users/0x00ff");
    }
}
