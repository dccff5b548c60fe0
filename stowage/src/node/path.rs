//! Normalized node paths

use crate::error::{StowageError, StowageResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A normalized, forward-slash separated path
///
/// - Backslashes become forward slashes
/// - Redundant separators and `.` segments are dropped
/// - Leading and trailing slashes are stripped
/// - `..` segments are rejected
///
/// # Examples
///
/// ```rust
/// use stowage::node::NodePath;
///
/// let path = NodePath::new("/images//./photo.JPG")?;
/// assert_eq!(path.as_str(), "images/photo.JPG");
/// assert_eq!(path.name(), "photo.JPG");
/// assert_eq!(path.extension(), Some("JPG"));
/// # Ok::<(), stowage::StowageError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Normalizes `path`
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if the path is empty after
    /// normalization or contains a `..` segment.
    pub fn new(path: impl AsRef<str>) -> StowageResult<Self> {
        normalize(path.as_ref()).map(Self)
    }

    /// The path as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last segment
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Extension of the last segment, without the dot
    ///
    /// Dotfiles such as `.gitignore` have no extension.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        split_extension(self.name()).1
    }

    /// The last segment with its extension removed
    #[must_use]
    pub fn name_without_extension(&self) -> &str {
        split_extension(self.name()).0
    }

    /// The parent directory, or `None` for a top-level entry
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0
            .rfind('/')
            .map(|pos| Self(self.0[..pos].to_string()))
    }

    /// Appends a child path
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `child` does not normalize.
    pub fn join(&self, child: impl AsRef<str>) -> StowageResult<Self> {
        Self::new(format!("{}/{}", self.0, child.as_ref()))
    }

    /// Whether `self` is a strict descendant of `ancestor`
    #[must_use]
    pub fn starts_with(&self, ancestor: &Self) -> bool {
        self.0
            .strip_prefix(ancestor.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NodePath {
    type Error = StowageError;

    fn try_from(value: String) -> StowageResult<Self> {
        Self::new(value)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

/// Normalizes a path string
///
/// # Errors
///
/// Returns [`StowageError::InvalidPath`] for empty paths and `..` segments.
pub fn normalize(path: &str) -> StowageResult<String> {
    let replaced = path.replace('\\', "/");
    let mut segments = Vec::new();

    for segment in replaced.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(StowageError::InvalidPath(format!(
                "\"{path}\": path traversal (..) not allowed"
            )));
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(StowageError::InvalidPath(format!("\"{path}\": empty path")));
    }

    Ok(segments.join("/"))
}

/// Splits a file name into stem and optional extension
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(pos) if pos + 1 == name.len() => (&name[..pos], None),
        Some(pos) => (&name[..pos], Some(&name[pos + 1..])),
    }
}
