//! Hierarchical store paths.

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// An immutable, slash-separated path identifying a node in the store.
///
/// Paths compare and hash by their full segment sequence. Empty segments are
/// dropped when parsing, so `"/a//b/"` and `"a/b"` are the same path.
///
/// # Example
///
/// ```rust
/// use noderepo_store::Path;
///
/// let root = Path::from_string("/provision/v1");
/// let node = root.append("ready").append("host1.example.com");
/// assert_eq!(node.to_string(), "/provision/v1/ready/host1.example.com");
/// assert_eq!(node.name(), Some("host1.example.com"));
/// assert_eq!(node.parent(), Some(root.append("ready")));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Returns the root path `/`.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a slash-separated string into a path.
    #[must_use]
    pub fn from_string(path: &str) -> Self {
        Self {
            segments: split(path).collect(),
        }
    }

    /// Returns a new path with `suffix` appended.
    ///
    /// The suffix may itself contain slashes, in which case each part
    /// becomes its own segment.
    #[must_use]
    pub fn append(&self, suffix: impl AsRef<str>) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(split(suffix.as_ref()));
        Self { segments }
    }

    /// Returns a new path with the single segment `name` appended.
    ///
    /// Unlike [`Path::append`], the name is taken verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if `name` is empty or contains
    /// a slash.
    pub fn child(&self, name: &str) -> StoreResult<Self> {
        if name.is_empty() {
            return Err(StoreError::invalid_path(self, "empty child name"));
        }
        if name.contains('/') {
            return Err(StoreError::invalid_path(
                self,
                format!("child name {name:?} contains '/'"),
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_owned());
        Ok(Self { segments })
    }

    /// Returns the parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Returns the last segment, or `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Returns true if this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path segments.
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns true if `self` is `other` or lies below it.
    #[must_use]
    pub fn starts_with(&self, other: &Path) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

fn split(path: &str) -> impl Iterator<Item = String> + '_ {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_owned)
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Self::from_string(path)
    }
}
