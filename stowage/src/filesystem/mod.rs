//! Filesystem interfaces consumed by the node model
//!
//! Concrete storage adapters (local disk, S3, archives) live outside this
//! crate and plug in through the [`Filesystem`] trait. [`MemoryFilesystem`]
//! is the in-memory adapter used for tests and embedded assets.
//!
//! A [`FilesystemProvider`] hands out filesystems by name; lazy nodes use it
//! to defer the lookup until first access. [`FilesystemRegistry`] is the
//! provider built from a fixed set of mounted filesystems.
//!
//! # Path Contract
//!
//! Paths passed to filesystem methods may be un-normalized; implementations
//! normalize them with [`NodePath::new`] before use.

mod memory;
mod stored;

pub use memory::MemoryFilesystem;
pub use stored::{stored_node, StoredDirectory, StoredFile, StoredImage};

use crate::error::{StowageError, StowageResult};
use crate::node::{Node, NodeKind, NodePath, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Metadata a filesystem reports for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// `File` or `Directory`; images are files with an `image/*` MIME type
    pub kind: NodeKind,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last modification time
    pub last_modified: DateTime<Utc>,
    /// Access visibility
    pub visibility: Visibility,
    /// MIME type, if known
    pub mime_type: Option<String>,
}

/// Byte-level storage backend
///
/// Implementations must be cheap to share; nodes they return keep an
/// `Arc` to the filesystem for later reads.
pub trait Filesystem: Send + Sync + fmt::Debug {
    /// Name under which this filesystem is registered
    fn name(&self) -> &str;

    /// Fetches the node at `path`
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::NotFound`] if nothing exists at `path`.
    fn node(&self, path: &str) -> StowageResult<Box<dyn Node>>;

    /// Reads the full contents of the file at `path`
    fn read(&self, path: &str) -> StowageResult<Vec<u8>>;

    /// Creates or overwrites the file at `path` and returns it
    ///
    /// Fails when `path` or one of its ancestors is taken by the other kind.
    fn write(&self, path: &str, bytes: &[u8]) -> StowageResult<Box<dyn Node>>;

    /// Whether a file or directory exists at `path`
    fn exists(&self, path: &str) -> StowageResult<bool>;

    /// Metadata of the entry at `path`
    fn metadata(&self, path: &str) -> StowageResult<Metadata>;

    /// Paths of the immediate children of the directory at `path`
    ///
    /// A file at `path` is a [`StowageError::TypeMismatch`].
    fn list(&self, path: &str) -> StowageResult<Vec<NodePath>>;

    /// Deletes the entry at `path`; deleting a missing entry is not an error
    fn delete(&self, path: &str) -> StowageResult<()>;
}

/// Hands out filesystems by name
#[cfg_attr(test, mockall::automock)]
pub trait FilesystemProvider: Send + Sync {
    /// The filesystem registered as `name`
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Config`] if no filesystem has that name.
    fn get(&self, name: &str) -> StowageResult<Arc<dyn Filesystem>>;

    /// The default filesystem
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Config`] if no default can be determined.
    fn default_filesystem(&self) -> StowageResult<Arc<dyn Filesystem>>;
}

/// Named set of mounted filesystems
///
/// # Examples
///
/// ```rust
/// use stowage::filesystem::{FilesystemProvider, FilesystemRegistry, MemoryFilesystem};
///
/// # fn example() -> stowage::StowageResult<()> {
/// let registry = FilesystemRegistry::new()
///     .mount(MemoryFilesystem::new("public"))
///     .mount(MemoryFilesystem::new("private"))
///     .with_default("public");
///
/// assert_eq!(registry.get("private")?.name(), "private");
/// assert_eq!(registry.default_filesystem()?.name(), "public");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FilesystemRegistry {
    filesystems: HashMap<String, Arc<dyn Filesystem>>,
    default: Option<String>,
}

impl FilesystemRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts a filesystem under its own name
    #[must_use]
    pub fn mount(self, filesystem: impl Filesystem + 'static) -> Self {
        self.mount_shared(Arc::new(filesystem))
    }

    /// Mounts an already shared filesystem under its own name
    #[must_use]
    pub fn mount_shared(mut self, filesystem: Arc<dyn Filesystem>) -> Self {
        tracing::debug!(filesystem = filesystem.name(), "Mounting filesystem");
        self.filesystems
            .insert(filesystem.name().to_string(), filesystem);
        self
    }

    /// Sets the filesystem returned by [`FilesystemProvider::default_filesystem`]
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Names of all mounted filesystems, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filesystems.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl FilesystemProvider for FilesystemRegistry {
    fn get(&self, name: &str) -> StowageResult<Arc<dyn Filesystem>> {
        self.filesystems
            .get(name)
            .cloned()
            .ok_or_else(|| StowageError::Config(format!("No filesystem named \"{name}\"")))
    }

    fn default_filesystem(&self) -> StowageResult<Arc<dyn Filesystem>> {
        if let Some(name) = &self.default {
            return self.get(name);
        }
        if self.filesystems.len() == 1 {
            if let Some(filesystem) = self.filesystems.values().next() {
                return Ok(Arc::clone(filesystem));
            }
        }
        Err(StowageError::Config(
            "No default filesystem configured".to_string(),
        ))
    }
}

/// Best-effort MIME type from content, falling back to the file name
pub(crate) fn detect_mime_type(name: &str, bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| {
            mime_guess::from_path(name)
                .first()
                .map(|mime| mime.essence_str().to_string())
        })
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
}
