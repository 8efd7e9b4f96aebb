// Hierarchical service names.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

/// Root of every name installed by this crate.
pub static ROOT: Lazy<ServiceName> = Lazy::new(|| ServiceName::of(["deployd"]));

/// ServiceName is a dot-separated, immutable path of segments (`deployd.mounts.app.war`).
///
/// Segments may themselves contain dots (artifact names usually do), so equality and
/// parent checks work on segments, not on the rendered string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceName {
    segments: Arc<[String]>,
}

impl ServiceName {
    /// Creates a name from its segments.
    pub fn of<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a new name with the given segment appended.
    pub fn append(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.to_vec();
        segments.push(segment.into());
        Self {
            segments: segments.into(),
        }
    }

    /// Returns the parent name, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec().into(),
        })
    }

    /// Checks whether `self` is a strict ancestor of `other`.
    pub fn is_parent_of(&self, other: &ServiceName) -> bool {
        other.segments.len() > self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Last segment of the name.
    pub fn simple_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl fmt::Debug for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceName({})", self)
    }
}

impl Serialize for ServiceName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
