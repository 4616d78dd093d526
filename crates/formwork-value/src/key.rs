//! Structural paths and content-stable position hashes
//!
//! Provides [`KeyPath`], the root-to-control path of names and array indexes,
//! and [`StructuralKey`], the Blake3 hash of that path. The key encodes
//! *position*, not content: two controls at the same path hash identically
//! across rebuilds, and a control's key changes whenever any ancestor's
//! position changes.

use std::fmt::{self, Display, Formatter};

/// One step in a control path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named child of a group
    Name(String),
    /// Positional child of an array group
    Index(usize),
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Path from the tree root down to one control
///
/// Rendered dot-joined (`root.items.2.title`) for error messages and lookup
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    /// Empty path (the root control)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Create path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the root path
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, if any
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Parent path (`None` at the root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Append a segment, returning a new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut next = self.clone();
        next.0.push(segment.into());
        next
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }
}

impl Display for KeyPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, ".");
        }
        let mut first = true;
        for segment in &self.0 {
            if !first {
                write!(f, ".")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

/// Content-stable hash of a control's path (Blake3)
///
/// Reconciliation identity and list keys use the short 16-hex-char rendering;
/// the full digest is kept so keys never collide in deep trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructuralKey([u8; 32]);

impl StructuralKey {
    /// Compute the key for a path
    #[must_use]
    pub fn compute(path: &KeyPath) -> Self {
        let rendered = path.to_string();
        let hash = blake3::hash(rendered.as_bytes());
        Self(*hash.as_bytes())
    }

    /// Short string representation (first 16 hex chars)
    ///
    /// This is the form used in `_key` metadata and DOM/list keys.
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }

    /// Full digest as hex
    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw digest bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for StructuralKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl serde::Serialize for StructuralKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_path_display_root() {
        assert_eq!(KeyPath::root().to_string(), ".");
    }

    #[test]
    fn key_path_display_mixed() {
        let path = KeyPath::root().child("items").child(2).child("title");
        assert_eq!(path.to_string(), "items.2.title");
    }

    #[test]
    fn key_path_parent() {
        let path = KeyPath::root().child("a").child("b");
        assert_eq!(path.parent().unwrap().to_string(), "a");
        assert!(KeyPath::root().parent().is_none());
    }

    #[test]
    fn key_path_prefix() {
        let parent = KeyPath::root().child("a");
        let child = parent.child("b");
        assert!(parent.is_prefix_of(&child));
        assert!(!child.is_prefix_of(&parent));
    }

    #[test]
    fn structural_key_stable_across_computations() {
        let path = KeyPath::root().child("a").child(0);
        assert_eq!(StructuralKey::compute(&path), StructuralKey::compute(&path));
    }

    #[test]
    fn structural_key_changes_with_position() {
        let at_zero = StructuralKey::compute(&KeyPath::root().child("a").child(0));
        let at_one = StructuralKey::compute(&KeyPath::root().child("a").child(1));
        assert_ne!(at_zero, at_one);
    }

    #[test]
    fn structural_key_short_form() {
        let key = StructuralKey::compute(&KeyPath::root().child("a"));
        assert_eq!(key.short().len(), 16);
        assert!(key.to_hex().starts_with(&key.short()));
    }
}
