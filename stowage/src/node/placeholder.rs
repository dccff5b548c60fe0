//! Stand-in for optional associations that have no file yet

use super::{
    ChecksumAlgorithm, Directory, File, Image, ImageMetadata, Node, NodeKind, NodePath, Visibility,
};
use crate::error::{StowageError, StowageResult};
use chrono::{DateTime, Utc};

/// A node that does not exist
///
/// `exists()` is `false` and a placeholder directory has no children.
/// Every other accessor fails with [`StowageError::Placeholder`].
///
/// # Examples
///
/// ```rust
/// use stowage::node::{File, Node, Placeholder};
///
/// let thumbnail = Placeholder::image();
/// assert!(!thumbnail.exists().unwrap());
/// assert!(thumbnail.ensure_file().unwrap().contents().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    kind: NodeKind,
}

impl Placeholder {
    /// Placeholder for a file
    #[must_use]
    pub const fn file() -> Self {
        Self {
            kind: NodeKind::File,
        }
    }

    /// Placeholder for an image
    #[must_use]
    pub const fn image() -> Self {
        Self {
            kind: NodeKind::Image,
        }
    }

    /// Placeholder for a directory
    #[must_use]
    pub const fn directory() -> Self {
        Self {
            kind: NodeKind::Directory,
        }
    }

    /// The kind of node this stands in for
    #[must_use]
    pub const fn stands_in_for(&self) -> NodeKind {
        self.kind
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Self::file()
    }
}

impl Node for Placeholder {
    fn path(&self) -> StowageResult<NodePath> {
        Err(StowageError::Placeholder("path"))
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Err(StowageError::Placeholder("kind"))
    }

    fn exists(&self) -> StowageResult<bool> {
        Ok(false)
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        Err(StowageError::Placeholder("modification time"))
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        Err(StowageError::Placeholder("visibility"))
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        Err(StowageError::Placeholder("filesystem"))
    }

    fn as_file(&self) -> Option<&dyn File> {
        self.kind.is_file().then_some(self as &dyn File)
    }

    fn as_directory(&self) -> Option<&dyn Directory> {
        (self.kind == NodeKind::Directory).then_some(self as &dyn Directory)
    }

    fn as_image(&self) -> Option<&dyn Image> {
        (self.kind == NodeKind::Image).then_some(self as &dyn Image)
    }
}

impl File for Placeholder {
    fn extension(&self) -> StowageResult<Option<String>> {
        Err(StowageError::Placeholder("extension"))
    }

    fn name_without_extension(&self) -> StowageResult<String> {
        Err(StowageError::Placeholder("name"))
    }

    fn size(&self) -> StowageResult<u64> {
        Err(StowageError::Placeholder("size"))
    }

    fn checksum(&self, _algorithm: Option<ChecksumAlgorithm>) -> StowageResult<String> {
        Err(StowageError::Placeholder("checksum"))
    }

    fn mime_type(&self) -> StowageResult<String> {
        Err(StowageError::Placeholder("MIME type"))
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        Err(StowageError::Placeholder("contents"))
    }
}

impl Image for Placeholder {
    fn image_metadata(&self) -> StowageResult<ImageMetadata> {
        Err(StowageError::Placeholder("image metadata"))
    }
}

impl Directory for Placeholder {
    fn children(&self) -> StowageResult<Vec<Box<dyn Node>>> {
        Ok(Vec::new())
    }
}
