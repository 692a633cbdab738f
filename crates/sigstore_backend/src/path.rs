//! Path value types.
//!
//! A [`Path`] addresses one location in the hierarchical document model.
//! Paths are immutable and structurally shared: deriving a child path
//! allocates a new segment slice and never touches the parent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// An array position.
    Index(usize),
    /// An object key or document id.
    Key(String),
}

impl Segment {
    /// Returns the key text, or `None` for an index segment.
    #[must_use]
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }

    /// Returns the index, or `None` for a key segment.
    #[must_use]
    pub const fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Key(_) => None,
        }
    }

    /// Renders the segment as a JSON value (string or number).
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Key(key) => Value::String(key.clone()),
            Self::Index(index) => Value::from(*index),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered, immutable sequence of [`Segment`]s.
///
/// Two paths are equal iff their segments are equal element-wise. Cloning a
/// path is cheap (reference-counted).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Arc<[Segment]>);

impl Path {
    /// Returns the empty (root) path.
    #[must_use]
    pub fn root() -> Self {
        Self(Arc::from(Vec::new()))
    }

    /// Builds a path from any sequence of segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Returns a new path with `segment` appended.
    #[must_use]
    pub fn child(&self, segment: impl Into<Segment>) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Self(segments.into())
    }

    /// Returns the path without its last segment, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        match self.0.split_last() {
            Some((_, rest)) => Some(Self(rest.into())),
            None => None,
        }
    }

    /// Returns the last segment, or `None` at the root.
    #[must_use]
    pub fn leaf(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Returns the segments as a slice.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the segments.
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.0.iter()
    }

    /// Returns true if `self` is `other` or one of its ancestors.
    #[must_use]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// Renders the path as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.0.iter().map(Segment::to_json).collect())
    }
}

impl Default for Path {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter()).finish()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl<S: Into<Segment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_segments(iter)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Path {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let segments = Vec::<Segment>::deserialize(deserializer)?;
        Ok(Self(segments.into()))
    }
}

/// Builds a [`Path`] from a list of segment-convertible expressions.
///
/// ```rust
/// use sigstore_backend::{path, Path, Segment};
///
/// let p = path!["posts", "a", 0usize];
/// assert_eq!(p.segments()[2], Segment::Index(0));
/// assert_eq!(path![], Path::root());
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($segment:expr),+ $(,)?) => {
        $crate::Path::from_segments([$($crate::Segment::from($segment)),+])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = Segment> {
        prop_oneof!["[a-z$_]{1,6}".prop_map(Segment::Key), (0usize..64).prop_map(Segment::Index)]
    }

    fn any_path() -> impl Strategy<Value = Path> {
        prop::collection::vec(segment(), 0..6).prop_map(Path::from_segments)
    }

    #[test]
    fn child_does_not_mutate_parent() {
        let parent = Path::from_segments(["posts"]);
        let child = parent.child("a");
        assert_eq!(parent.len(), 1);
        assert_eq!(child.segments(), &[Segment::from("posts"), Segment::from("a")]);
    }

    #[test]
    fn parent_and_leaf() {
        let p = path!["a", "b", 2usize];
        assert_eq!(p.leaf(), Some(&Segment::Index(2)));
        assert_eq!(p.parent(), Some(path!["a", "b"]));
        assert_eq!(Path::root().parent(), None);
        assert_eq!(Path::root().leaf(), None);
    }

    #[test]
    fn equality_is_element_wise() {
        let a = Path::from_segments(["x", "y"]);
        let b = Path::root().child("x").child("y");
        assert_eq!(a, b);
        assert_ne!(a, path!["x", "y", "z"]);
        assert_ne!(path!["0"], path![0usize]);
    }

    #[test]
    fn display_is_dotted() {
        assert_eq!(path!["a", 1usize, "b"].to_string(), "a.1.b");
        assert_eq!(Path::root().to_string(), "");
    }

    #[test]
    fn prefix() {
        assert!(Path::root().is_prefix_of(&path!["a"]));
        assert!(path!["a"].is_prefix_of(&path!["a", "b"]));
        assert!(!path!["a", "b"].is_prefix_of(&path!["a"]));
        assert!(!path!["b"].is_prefix_of(&path!["a", "b"]));
    }

    #[test]
    fn json_rendering() {
        assert_eq!(path!["a", 3usize].to_json(), serde_json::json!(["a", 3]));
        let decoded: Path = serde_json::from_value(serde_json::json!(["a", 3])).unwrap();
        assert_eq!(decoded, path!["a", 3usize]);
    }

    proptest! {
        #[test]
        fn child_is_undone_by_parent(base in any_path(), next in segment()) {
            let child = base.child(next.clone());
            prop_assert_eq!(child.len(), base.len() + 1);
            prop_assert_eq!(child.leaf(), Some(&next));
            prop_assert_eq!(child.parent(), Some(base));
        }

        #[test]
        fn extensions_are_prefixed(base in any_path(), suffix in prop::collection::vec(segment(), 0..4)) {
            let extended = Path::from_segments(base.iter().cloned().chain(suffix.iter().cloned()));
            prop_assert!(base.is_prefix_of(&extended));
            prop_assert_eq!(extended.is_prefix_of(&base), suffix.is_empty());
        }
    }
}
