//! In-memory filesystem

use super::{detect_mime_type, stored_node, Filesystem, Metadata};
use crate::error::{StowageError, StowageResult};
use crate::node::{Node, NodeKind, NodePath, Visibility};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Entry {
    data: Arc<[u8]>,
    last_modified: DateTime<Utc>,
    visibility: Visibility,
    mime_type: String,
}

/// In-memory filesystem for tests and embedded assets
///
/// Cloning is cheap and clones share the same contents. Directories are
/// implicit: a directory exists whenever a file path has it as a prefix.
///
/// # Examples
///
/// ```rust
/// use stowage::filesystem::{Filesystem, MemoryFilesystem};
///
/// # fn example() -> stowage::StowageResult<()> {
/// let fs = MemoryFilesystem::new("public");
/// fs.write("config/settings.json", b"{}")?;
///
/// assert!(fs.exists("config")?);
/// assert_eq!(fs.read("config/settings.json")?, b"{}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFilesystem {
    name: Arc<str>,
    files: Arc<RwLock<BTreeMap<NodePath, Entry>>>,
}

impl MemoryFilesystem {
    /// Creates an empty filesystem registered as `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            files: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Changes the visibility of an existing file
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::NotFound`] if no file exists at `path`.
    pub fn set_visibility(&self, path: &str, visibility: Visibility) -> StowageResult<()> {
        let path = NodePath::new(path)?;
        let mut files = self.files.write();
        let entry = files
            .get_mut(&path)
            .ok_or_else(|| StowageError::NotFound(path.to_string()))?;
        entry.visibility = visibility;
        Ok(())
    }

    /// Number of stored files
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether no file is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    fn is_directory(files: &BTreeMap<NodePath, Entry>, path: &NodePath) -> bool {
        files.keys().any(|key| key.starts_with(path))
    }

    /// Nearest ancestor of `path` stored as a file
    fn file_ancestor(files: &BTreeMap<NodePath, Entry>, path: &NodePath) -> Option<NodePath> {
        std::iter::successors(path.parent(), NodePath::parent).find(|dir| files.contains_key(dir))
    }

    fn not_a_directory(path: &NodePath) -> StowageError {
        StowageError::TypeMismatch {
            expected: "directory",
            actual: "file",
            path: path.to_string(),
        }
    }

    fn shared(&self) -> Arc<dyn Filesystem> {
        Arc::new(self.clone())
    }
}

impl Filesystem for MemoryFilesystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn node(&self, path: &str) -> StowageResult<Box<dyn Node>> {
        stored_node(self.shared(), path)
    }

    fn read(&self, path: &str) -> StowageResult<Vec<u8>> {
        let path = NodePath::new(path)?;
        self.files
            .read()
            .get(&path)
            .map(|entry| entry.data.to_vec())
            .ok_or_else(|| StowageError::NotFound(path.to_string()))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> StowageResult<Box<dyn Node>> {
        let path = NodePath::new(path)?;
        {
            let mut files = self.files.write();
            if Self::is_directory(&files, &path) {
                return Err(StowageError::InvalidPath(format!(
                    "{path} is a directory"
                )));
            }
            if let Some(file) = Self::file_ancestor(&files, &path) {
                return Err(Self::not_a_directory(&file));
            }
            let visibility = files
                .get(&path)
                .map_or_else(Visibility::default, |existing| existing.visibility);
            files.insert(
                path.clone(),
                Entry {
                    data: Arc::from(bytes),
                    last_modified: Utc::now(),
                    visibility,
                    mime_type: detect_mime_type(path.name(), bytes),
                },
            );
        }
        tracing::trace!(filesystem = %self.name, path = %path, size = bytes.len(), "Wrote file");
        self.node(path.as_str())
    }

    fn exists(&self, path: &str) -> StowageResult<bool> {
        let path = NodePath::new(path)?;
        let files = self.files.read();
        Ok(files.contains_key(&path) || Self::is_directory(&files, &path))
    }

    fn metadata(&self, path: &str) -> StowageResult<Metadata> {
        let path = NodePath::new(path)?;
        let files = self.files.read();

        if let Some(entry) = files.get(&path) {
            return Ok(Metadata {
                kind: NodeKind::File,
                size: entry.data.len() as u64,
                last_modified: entry.last_modified,
                visibility: entry.visibility,
                mime_type: Some(entry.mime_type.clone()),
            });
        }

        let newest_child = files
            .iter()
            .filter(|(key, _)| key.starts_with(&path))
            .map(|(_, entry)| entry.last_modified)
            .max()
            .ok_or_else(|| StowageError::NotFound(path.to_string()))?;

        Ok(Metadata {
            kind: NodeKind::Directory,
            size: 0,
            last_modified: newest_child,
            visibility: Visibility::Public,
            mime_type: None,
        })
    }

    fn list(&self, path: &str) -> StowageResult<Vec<NodePath>> {
        let path = NodePath::new(path)?;
        let files = self.files.read();
        if files.contains_key(&path) {
            return Err(Self::not_a_directory(&path));
        }
        let prefix = format!("{path}/");

        let children: BTreeSet<String> = files
            .keys()
            .filter_map(|key| key.as_str().strip_prefix(&prefix))
            .map(|rest| rest.split('/').next().unwrap_or(rest).to_string())
            .collect();

        if children.is_empty() {
            return Err(StowageError::NotFound(path.to_string()));
        }

        children
            .into_iter()
            .map(|child| path.join(child))
            .collect()
    }

    fn delete(&self, path: &str) -> StowageResult<()> {
        let path = NodePath::new(path)?;
        let mut files = self.files.write();
        files.retain(|key, _| key != &path && !key.starts_with(&path));
        Ok(())
    }
}
