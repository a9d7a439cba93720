//! Key paths into document trees.
//!
//! A [`Path`] is the sequence of object keys and array indices leading from
//! a document root to one node. Its text form joins the segments with `.`,
//! so the second tag of `{"tags": ["a", "b"]}` lives at `tags.1`.
//!
//! The *element path* of a path is the same path with its array indices
//! removed (`tags.1` becomes `tags`). Filters on an element path match any
//! array element beneath it.

use crate::error::{CoreError, CoreResult};
use jsondb_codec::Value;
use std::fmt;

/// Separator between segments in the text form of a path.
pub const PATH_SEPARATOR: char = '.';

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    /// Object member name.
    Key(String),
    /// Array position.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Sequence of segments from a document root to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<Segment>);

impl Path {
    /// The empty path, addressing the root.
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the root path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the last segment.
    #[must_use]
    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Appends a segment.
    pub fn push(&mut self, segment: Segment) {
        self.0.push(segment);
    }

    /// Removes the last segment.
    pub fn pop(&mut self) -> Option<Segment> {
        self.0.pop()
    }

    /// Returns true if any segment is an array index.
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.0.iter().any(|s| matches!(s, Segment::Index(_)))
    }

    /// Returns the text form with array indices removed.
    #[must_use]
    pub fn element_path(&self) -> String {
        join(self.0.iter().filter(|s| matches!(s, Segment::Key(_))))
    }
}

fn join<'a>(segments: impl Iterator<Item = &'a Segment>) -> String {
    let mut out = String::new();
    for (i, segment) in segments.enumerate() {
        if i > 0 {
            out.push(PATH_SEPARATOR);
        }
        out.push_str(&segment.to_string());
    }
    out
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(self.0.iter()))
    }
}

impl From<Vec<Segment>> for Path {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Looks up the node at a dotted path.
///
/// Numeric segments index arrays and name members of objects.
#[must_use]
pub fn value_at<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    if dotted.is_empty() {
        return Some(root);
    }
    dotted
        .split(PATH_SEPARATOR)
        .try_fold(root, |node, part| match node {
            Value::Object(members) => members.get(part),
            Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Stores `value` at a dotted path, creating intermediate objects.
///
/// # Errors
///
/// Returns [`CoreError::InvalidIdentifier`] if the path is empty or crosses
/// a scalar or an array position that does not exist.
pub fn set_value_at(root: &mut Value, dotted: &str, value: Value) -> CoreResult<()> {
    let mut parts = dotted.split(PATH_SEPARATOR).peekable();
    let mut node = root;
    while let Some(part) = parts.next() {
        if part.is_empty() {
            return Err(CoreError::invalid_identifier(format!(
                "empty segment in path {dotted:?}"
            )));
        }
        let last = parts.peek().is_none();
        node = match node {
            Value::Object(members) => {
                if last {
                    members.insert(part.to_string(), value);
                    return Ok(());
                }
                members.entry(part.to_string()).or_insert_with(Value::object)
            }
            Value::Array(items) => {
                let slot = part
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| items.get_mut(i))
                    .ok_or_else(|| {
                        CoreError::invalid_identifier(format!(
                            "no array element {part:?} on path {dotted:?}"
                        ))
                    })?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                slot
            }
            other => {
                return Err(CoreError::invalid_identifier(format!(
                    "path {dotted:?} crosses a {}",
                    other.type_name()
                )))
            }
        };
    }
    Err(CoreError::invalid_identifier("empty identifier path"))
}
