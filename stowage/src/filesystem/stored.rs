//! Eager nodes backed by a [`Filesystem`]

use super::{Filesystem, Metadata};
use crate::error::StowageResult;
use crate::node::{
    Directory, File, Image, ImageMetadata, Node, NodeKind, NodePath, Visibility,
};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// Builds the concrete node for `path`, picking the type from its metadata
///
/// Files whose MIME type starts with `image/` become [`StoredImage`].
///
/// # Errors
///
/// Propagates path normalization and metadata failures, including
/// [`StowageError::NotFound`](crate::StowageError::NotFound).
pub fn stored_node(filesystem: Arc<dyn Filesystem>, path: &str) -> StowageResult<Box<dyn Node>> {
    let path = NodePath::new(path)?;
    let metadata = filesystem.metadata(path.as_str())?;

    let node: Box<dyn Node> = match metadata.kind {
        NodeKind::Directory => Box::new(StoredDirectory {
            path,
            filesystem,
            metadata,
        }),
        _ if metadata
            .mime_type
            .as_deref()
            .is_some_and(|mime| mime.starts_with("image/")) =>
        {
            Box::new(StoredImage::new(StoredFile {
                path,
                filesystem,
                metadata,
            }))
        }
        _ => Box::new(StoredFile {
            path,
            filesystem,
            metadata,
        }),
    };
    Ok(node)
}

/// A file in a filesystem
///
/// Metadata is captured when the node is fetched; contents are read on
/// every call.
#[derive(Clone)]
pub struct StoredFile {
    path: NodePath,
    filesystem: Arc<dyn Filesystem>,
    metadata: Metadata,
}

impl fmt::Debug for StoredFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredFile")
            .field("filesystem", &self.filesystem.name())
            .field("path", &self.path)
            .field("size", &self.metadata.size)
            .finish()
    }
}

impl PartialEq for StoredFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.filesystem.name() == other.filesystem.name()
    }
}

impl Node for StoredFile {
    fn path(&self) -> StowageResult<NodePath> {
        Ok(self.path.clone())
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Ok(NodeKind::File)
    }

    fn exists(&self) -> StowageResult<bool> {
        self.filesystem.exists(self.path.as_str())
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        Ok(self.metadata.last_modified)
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        Ok(self.metadata.visibility)
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        Ok(Some(self.filesystem.name().to_string()))
    }

    fn as_file(&self) -> Option<&dyn File> {
        Some(self)
    }
}

impl File for StoredFile {
    fn size(&self) -> StowageResult<u64> {
        Ok(self.metadata.size)
    }

    fn mime_type(&self) -> StowageResult<String> {
        Ok(self.metadata.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(self.path.as_str())
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        }))
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        self.filesystem.read(self.path.as_str())
    }
}

/// An image file in a filesystem
///
/// Dimensions, EXIF and IPTC are decoded once on first access.
#[derive(Debug)]
pub struct StoredImage {
    file: StoredFile,
    image: OnceCell<ImageMetadata>,
}

impl StoredImage {
    fn new(file: StoredFile) -> Self {
        Self {
            file,
            image: OnceCell::new(),
        }
    }
}

impl Node for StoredImage {
    fn path(&self) -> StowageResult<NodePath> {
        self.file.path()
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Ok(NodeKind::Image)
    }

    fn exists(&self) -> StowageResult<bool> {
        self.file.exists()
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        self.file.last_modified()
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        self.file.visibility()
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        self.file.filesystem_name()
    }

    fn as_file(&self) -> Option<&dyn File> {
        Some(self)
    }

    fn as_image(&self) -> Option<&dyn Image> {
        Some(self)
    }
}

impl File for StoredImage {
    fn size(&self) -> StowageResult<u64> {
        self.file.size()
    }

    fn mime_type(&self) -> StowageResult<String> {
        self.file.mime_type()
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        self.file.contents()
    }
}

impl Image for StoredImage {
    fn image_metadata(&self) -> StowageResult<ImageMetadata> {
        self.image
            .get_or_try_init(|| ImageMetadata::read(&self.file.contents()?))
            .cloned()
    }
}

/// A directory in a filesystem
#[derive(Clone)]
pub struct StoredDirectory {
    path: NodePath,
    filesystem: Arc<dyn Filesystem>,
    metadata: Metadata,
}

impl fmt::Debug for StoredDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDirectory")
            .field("filesystem", &self.filesystem.name())
            .field("path", &self.path)
            .finish()
    }
}

impl Node for StoredDirectory {
    fn path(&self) -> StowageResult<NodePath> {
        Ok(self.path.clone())
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Ok(NodeKind::Directory)
    }

    fn exists(&self) -> StowageResult<bool> {
        self.filesystem.exists(self.path.as_str())
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        Ok(self.metadata.last_modified)
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        Ok(self.metadata.visibility)
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        Ok(Some(self.filesystem.name().to_string()))
    }

    fn as_directory(&self) -> Option<&dyn Directory> {
        Some(self)
    }
}

impl Directory for StoredDirectory {
    fn children(&self) -> StowageResult<Vec<Box<dyn Node>>> {
        self.filesystem
            .list(self.path.as_str())?
            .iter()
            .map(|child| stored_node(Arc::clone(&self.filesystem), child.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::filesystem::{Filesystem, MemoryFilesystem};
    use crate::node::image::fixtures::PNG_1X1;
    use crate::node::{ChecksumAlgorithm, NodeKind};

    #[test]
    fn test_stored_file_accessors() {
        let fs = MemoryFilesystem::new("public");
        let node = fs.write("docs/report.txt", b"quarterly").unwrap();

        assert_eq!(node.kind().unwrap(), NodeKind::File);
        assert_eq!(node.filesystem_name().unwrap().as_deref(), Some("public"));
        let file = node.ensure_file().unwrap();
        assert_eq!(file.size().unwrap(), 9);
        assert_eq!(file.mime_type().unwrap(), "text/plain");
        assert_eq!(
            file.checksum(Some(ChecksumAlgorithm::Md5)).unwrap(),
            ChecksumAlgorithm::Md5.digest(b"quarterly")
        );
        assert!(node.as_image().is_none());
    }

    #[test]
    fn test_png_becomes_image() {
        let fs = MemoryFilesystem::new("public");
        let node = fs.write("img/dot.png", PNG_1X1).unwrap();

        assert_eq!(node.kind().unwrap(), NodeKind::Image);
        let image = node.ensure_image().unwrap();
        assert_eq!(image.width().unwrap(), 1);
        assert_eq!(image.height().unwrap(), 1);
        assert!(image.exif().unwrap().is_empty());
    }

    #[test]
    fn test_directory_children() {
        let fs = MemoryFilesystem::new("public");
        fs.write("dir/a.txt", b"a").unwrap();
        fs.write("dir/sub/b.txt", b"b").unwrap();

        let dir = fs.node("dir").unwrap();
        let children = dir.ensure_directory().unwrap().children().unwrap();
        let names: Vec<String> = children.iter().map(|c| c.name().unwrap()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert_eq!(children[1].kind().unwrap(), NodeKind::Directory);
    }

    #[test]
    fn test_exists_reflects_deletion() {
        let fs = MemoryFilesystem::new("public");
        let node = fs.write("gone.txt", b"x").unwrap();
        assert!(node.exists().unwrap());
        fs.delete("gone.txt").unwrap();
        assert!(!node.exists().unwrap());
    }
}
