//! Core types for the state store.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Separator between path segments in the dotted form.
pub const PATH_SEPARATOR: char = '.';

/// Position in the store-wide commit order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

/// Identifier assigned to every enqueued transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransactionId(pub u64);

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tx({})", self.0)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A location in the state tree, stored as a sequence of keys.
///
/// The empty sequence is the root. Ancestry is decided on whole segments,
/// so `ab` is never treated as a prefix of `abc`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Path(Vec<String>);

impl Path {
    /// The root path (the whole tree).
    pub fn root() -> Self {
        Path(Vec::new())
    }

    /// Parse a dotted path. The empty string is the root.
    ///
    /// Empty segments (`"a..b"`, `".a"`, `"a."`) are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }

        let mut segments = Vec::new();
        for segment in raw.split(PATH_SEPARATOR) {
            if segment.is_empty() {
                return Err(StoreError::InvalidPath(raw.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Path(segments))
    }

    /// Build a path from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path one level below this one.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Path(segments)
    }

    /// True if `self` equals `other` or lies above it in the tree.
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Two paths conflict when their subtrees can overlap.
    pub fn conflicts_with(&self, other: &Path) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

impl FromStr for Path {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            write!(f, "{segment}")?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

/// The set of paths one handler is entitled to read and write.
///
/// Members never overlap: a set cannot hold a path together with one of its
/// ancestors, or the same path twice.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct PathSet(Vec<Path>);

impl PathSet {
    /// A set containing only the root.
    pub fn root() -> Self {
        PathSet(vec![Path::root()])
    }

    /// Build a set, rejecting overlapping members.
    pub fn new(paths: Vec<Path>) -> Result<Self> {
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                if a.conflicts_with(b) {
                    let (ancestor, descendant) = if a.len() <= b.len() {
                        (a.clone(), b.clone())
                    } else {
                        (b.clone(), a.clone())
                    };
                    return Err(StoreError::OverlappingPaths {
                        ancestor,
                        descendant,
                    });
                }
            }
        }
        Ok(PathSet(paths))
    }

    /// Parse each dotted string and build a set.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = raw
            .into_iter()
            .map(|s| Path::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(paths)
    }

    pub fn contains_root(&self) -> bool {
        self.0.iter().any(Path::is_root)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if any member conflicts with `path`.
    pub fn conflicts_with(&self, path: &Path) -> bool {
        self.0.iter().any(|p| p.conflicts_with(path))
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, path) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "\"{path}\"")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathSet{self}")
    }
}

/// A typed event routed to every handler registered for its type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    /// An event without payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: None,
        }
    }

    /// An event carrying a payload.
    pub fn with_payload(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Some(payload),
        }
    }
}

/// Lifecycle phase of a store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// The boot event has been dispatched and is draining.
    Booting,
    /// Boot finished; normal dispatch.
    Ready,
}
