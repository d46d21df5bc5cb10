//! Dotted-path addressing into nested documents.
//!
//! A [`Path`] is an immutable sequence of segments (`a.b.0.c`). Field names
//! are reference-counted so clones are cheap; nested evaluation contexts
//! clone-and-push rather than sharing mutable path state.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::error::{Result, TramaError};

/// One path segment: an object field, an array index, or the `*` wildcard.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PathSeg {
    /// Object field access by name.
    Field(Arc<str>),
    /// Array element access by index.
    Index(usize),
    /// Wildcard matching every element of an array.
    Any,
}

impl fmt::Display for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSeg::Field(name) => f.write_str(name),
            PathSeg::Index(i) => write!(f, "{i}"),
            PathSeg::Any => f.write_str("*"),
        }
    }
}

impl fmt::Debug for PathSeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// An immutable document path.
///
/// The empty path addresses the document root. Paths are value types: all
/// combinators return new paths, leaving the receiver untouched. The one
/// mutating method, [`Path::set_last_index`], exists for array-scan cursors
/// that repoint the same path at successive elements.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segs: SmallVec<[PathSeg; 4]>,
}

impl Path {
    /// The empty path, addressing the document root.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a dotted path. Numeric segments become array indexes and `*`
    /// becomes the wildcard. The empty string parses to the empty path.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::empty());
        }
        let mut segs = SmallVec::new();
        for part in s.split('.') {
            if part.is_empty() {
                return Err(TramaError::InvalidArgument(format!(
                    "empty segment in path '{s}'"
                )));
            }
            if part == "*" {
                segs.push(PathSeg::Any);
            } else if let Ok(i) = part.parse::<usize>() {
                segs.push(PathSeg::Index(i));
            } else {
                segs.push(PathSeg::Field(Arc::from(part)));
            }
        }
        Ok(Self { segs })
    }

    /// Number of segments.
    pub fn len(&self) -> usize {
        self.segs.len()
    }

    /// True for the root path.
    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    /// The segments, in root-to-leaf order.
    pub fn segments(&self) -> &[PathSeg] {
        &self.segs
    }

    /// The last segment, if any.
    pub fn last(&self) -> Option<&PathSeg> {
        self.segs.last()
    }

    /// Returns `self` extended with every segment of `rel`.
    pub fn appended(&self, rel: &Path) -> Path {
        let mut segs = self.segs.clone();
        segs.extend(rel.segs.iter().cloned());
        Path { segs }
    }

    /// Returns `self` extended with one array index segment.
    pub fn appended_index(&self, index: usize) -> Path {
        self.appended_seg(PathSeg::Index(index))
    }

    /// Returns `self` extended with one segment.
    pub fn appended_seg(&self, seg: PathSeg) -> Path {
        let mut segs = self.segs.clone();
        segs.push(seg);
        Path { segs }
    }

    /// Replaces the last segment with an array index, in place.
    ///
    /// Used by element cursors while scanning a candidate array: the path
    /// length never changes, only the trailing index. No-op on the empty
    /// path.
    pub fn set_last_index(&mut self, index: usize) {
        if let Some(last) = self.segs.last_mut() {
            *last = PathSeg::Index(index);
        }
    }

    /// True if any segment is the `*` wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.segs.iter().any(|s| matches!(s, PathSeg::Any))
    }

    /// True if `prefix` is a leading subsequence of `self`.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segs.len() >= prefix.segs.len() && self.segs[..prefix.segs.len()] == prefix.segs[..]
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            fmt::Display::fmt(seg, f)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl FromStr for Path {
    type Err = TramaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Path::parse(&s).map_err(D::Error::custom)
    }
}
