//! Node object model
//!
//! A node is any addressable entry of a filesystem: a [`File`], a
//! [`Directory`] or an [`Image`]. Eager nodes returned by a
//! [`Filesystem`](crate::filesystem::Filesystem), [`LazyNode`],
//! [`Placeholder`] and [`PendingFile`] all answer the same contract, which
//! is why every accessor is fallible.
//!
//! # Examples
//!
//! ```rust
//! use stowage::filesystem::{Filesystem, MemoryFilesystem};
//! use stowage::node::{File, Node};
//!
//! # fn example() -> stowage::StowageResult<()> {
//! let fs = MemoryFilesystem::new("public");
//! fs.write("docs/readme.md", b"# hello")?;
//!
//! let node = fs.node("docs/readme.md")?;
//! let file = node.ensure_file()?;
//! assert_eq!(file.extension()?.as_deref(), Some("md"));
//! assert_eq!(file.size()?, 7);
//! # Ok(())
//! # }
//! ```

mod checksum;
pub(crate) mod image;
pub mod lazy;
mod path;
pub mod pending;
mod placeholder;

pub use checksum::ChecksumAlgorithm;
pub use self::image::ImageMetadata;
pub use lazy::{FilesystemSource, LazyNode, PathSource};
pub use path::{normalize, NodePath};
pub use pending::{PendingFile, UploadedFile};
pub use placeholder::Placeholder;

pub(crate) use path::split_extension;

use crate::error::{StowageError, StowageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The concrete type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// File recognized as an image
    Image,
}

impl NodeKind {
    /// Lowercase name used in error messages
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Image => "image",
        }
    }

    /// Whether nodes of this kind carry byte content
    #[must_use]
    pub const fn is_file(self) -> bool {
        matches!(self, Self::File | Self::Image)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access visibility of a stored node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Readable by anyone with the URL
    #[default]
    Public,
    /// Restricted
    Private,
}

/// Shared contract of every node
pub trait Node: Send + fmt::Debug {
    /// Normalized path of the node
    fn path(&self) -> StowageResult<NodePath>;

    /// Last path segment
    fn name(&self) -> StowageResult<String> {
        Ok(self.path()?.name().to_string())
    }

    /// Concrete kind
    fn kind(&self) -> StowageResult<NodeKind>;

    /// Whether the node exists in its backing store
    fn exists(&self) -> StowageResult<bool>;

    /// Last modification time
    fn last_modified(&self) -> StowageResult<DateTime<Utc>>;

    /// Access visibility
    fn visibility(&self) -> StowageResult<Visibility>;

    /// Name of the backing filesystem, `None` for local pending files
    fn filesystem_name(&self) -> StowageResult<Option<String>>;

    /// Narrows to a file without failing
    fn as_file(&self) -> Option<&dyn File> {
        None
    }

    /// Narrows to a directory without failing
    fn as_directory(&self) -> Option<&dyn Directory> {
        None
    }

    /// Narrows to an image without failing
    fn as_image(&self) -> Option<&dyn Image> {
        None
    }

    /// Narrows to a not-yet-stored local file
    fn as_pending(&self) -> Option<&PendingFile> {
        None
    }

    /// Narrows to a file
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::TypeMismatch`] if the node is not a file.
    fn ensure_file(&self) -> StowageResult<&dyn File> {
        self.as_file()
            .ok_or_else(|| type_mismatch(NodeKind::File, self))
    }

    /// Narrows to a directory
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::TypeMismatch`] if the node is not a directory.
    fn ensure_directory(&self) -> StowageResult<&dyn Directory> {
        self.as_directory()
            .ok_or_else(|| type_mismatch(NodeKind::Directory, self))
    }

    /// Narrows to an image
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::TypeMismatch`] if the node is not an image.
    fn ensure_image(&self) -> StowageResult<&dyn Image> {
        self.as_image()
            .ok_or_else(|| type_mismatch(NodeKind::Image, self))
    }
}

/// A node with byte content
pub trait File: Node {
    /// Extension of the name, without the dot
    fn extension(&self) -> StowageResult<Option<String>> {
        Ok(self.path()?.extension().map(str::to_string))
    }

    /// Name with the extension removed
    fn name_without_extension(&self) -> StowageResult<String> {
        Ok(self.path()?.name_without_extension().to_string())
    }

    /// Size in bytes
    fn size(&self) -> StowageResult<u64>;

    /// Hex checksum of the contents, MD5 unless `algorithm` is given
    fn checksum(&self, algorithm: Option<ChecksumAlgorithm>) -> StowageResult<String> {
        Ok(algorithm.unwrap_or_default().digest(&self.contents()?))
    }

    /// MIME type
    fn mime_type(&self) -> StowageResult<String>;

    /// Full contents
    fn contents(&self) -> StowageResult<Vec<u8>>;

    /// Contents decoded as UTF-8
    fn read_to_string(&self) -> StowageResult<String> {
        String::from_utf8(self.contents()?).map_err(|e| {
            StowageError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// A file with pixel dimensions and embedded metadata
pub trait Image: File {
    /// Decoded image metadata
    fn image_metadata(&self) -> StowageResult<ImageMetadata>;

    /// Width in pixels
    fn width(&self) -> StowageResult<u32> {
        Ok(self.image_metadata()?.width)
    }

    /// Height in pixels
    fn height(&self) -> StowageResult<u32> {
        Ok(self.image_metadata()?.height)
    }

    /// Width divided by height
    fn aspect_ratio(&self) -> StowageResult<f64> {
        self.image_metadata()?.aspect_ratio()
    }

    /// EXIF tags rendered as strings
    fn exif(&self) -> StowageResult<BTreeMap<String, String>> {
        Ok(self.image_metadata()?.exif)
    }

    /// IPTC datasets keyed `record#dataset`
    fn iptc(&self) -> StowageResult<BTreeMap<String, String>> {
        Ok(self.image_metadata()?.iptc)
    }
}

/// A node containing other nodes
pub trait Directory: Node {
    /// Immediate children
    fn children(&self) -> StowageResult<Vec<Box<dyn Node>>>;
}

/// Whether two nodes refer to the same entry of the same filesystem
///
/// # Errors
///
/// Propagates failures to resolve either node's path or filesystem.
pub fn same_node(a: &dyn Node, b: &dyn Node) -> StowageResult<bool> {
    Ok(a.path()? == b.path()? && a.filesystem_name()? == b.filesystem_name()?)
}

pub(crate) fn type_mismatch<N: Node + ?Sized>(expected: NodeKind, node: &N) -> StowageError {
    StowageError::TypeMismatch {
        expected: expected.as_str(),
        actual: node.kind().map_or("node", NodeKind::as_str),
        path: node
            .path()
            .map_or_else(|_| "?".to_string(), |p| p.to_string()),
    }
}
