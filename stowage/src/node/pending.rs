//! Local files that have not been stored yet

use super::{
    split_extension, ChecksumAlgorithm, File, Image, ImageMetadata, Node, NodeKind, NodePath,
    Visibility,
};
use crate::config::PendingConfig;
use crate::error::{StowageError, StowageResult};
use crate::filesystem::detect_mime_type;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// A file that has been uploaded but not yet stored
///
/// # Examples
///
/// ```rust
/// use stowage::node::UploadedFile;
///
/// let file = UploadedFile::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8, 0xFF]);
/// assert_eq!(file.size(), 3);
/// assert_eq!(file.extension(), Some("jpg"));
/// ```
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename from the upload
    pub filename: String,

    /// MIME content type sent by the client, may be empty
    pub content_type: String,

    /// File data
    pub data: Vec<u8>,
}

impl UploadedFile {
    /// Creates a new uploaded file
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Extension of the filename, without the dot
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        split_extension(client_base_name(&self.filename)).1
    }

    /// Validates the size against a maximum
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::FileSizeExceeded`] if the upload is larger
    /// than `max_bytes`.
    pub fn validate_size(&self, max_bytes: u64) -> StowageResult<()> {
        let size = self.size();
        if size > max_bytes {
            return Err(StowageError::FileSizeExceeded {
                actual: size,
                limit: max_bytes,
            });
        }
        Ok(())
    }

    /// Validates the content type against an allowlist
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidMimeType`] if the content type matches
    /// none of `allowed_types`. `image/*` style entries match a whole family.
    pub fn validate_mime(&self, allowed_types: &[&str]) -> StowageResult<()> {
        let actual = self.content_type.as_str();
        let allowed = allowed_types.iter().any(|allowed| {
            allowed.strip_suffix("/*").map_or(*allowed == actual, |family| {
                actual
                    .split_once('/')
                    .is_some_and(|(actual_family, _)| actual_family == family)
            })
        });
        if !allowed {
            return Err(StowageError::InvalidMimeType {
                expected: allowed_types.iter().map(|s| (*s).to_string()).collect(),
                actual: self.content_type.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug)]
enum Backing {
    /// Temp file deleted on disposal or when the last clone drops
    Owned(TempPath),
    /// Caller-owned file, never deleted
    Borrowed(PathBuf),
    Disposed,
}

impl Backing {
    fn path(&self) -> Option<&Path> {
        match self {
            Self::Owned(temp) => Some(&**temp),
            Self::Borrowed(path) => Some(path.as_path()),
            Self::Disposed => None,
        }
    }
}

#[derive(Debug)]
struct Inner {
    original_name: String,
    mime_type: String,
    backing: RwLock<Backing>,
}

/// A local file awaiting a final path in a target filesystem
///
/// Every accessor reads the local copy, never a remote store. Clones share
/// the same backing file. The file stays readable any number of times until
/// [`dispose`](Self::dispose) is called; an owned temp file is also removed
/// when the last clone is dropped.
///
/// Its [`path`](Node::path) is the original name, which is what namers see
/// through `{name}` and `{ext}`.
///
/// # Examples
///
/// ```rust
/// use stowage::node::{File, PendingFile};
///
/// # fn example() -> stowage::StowageResult<()> {
/// let upload = PendingFile::from_bytes("Quarterly Report.PDF", b"%PDF-1.7")?;
/// assert_eq!(upload.original_extension_with_dot(), ".PDF");
/// assert_eq!(upload.size()?, 8);
///
/// upload.dispose()?;
/// assert!(upload.contents().is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PendingFile {
    inner: Arc<Inner>,
}

impl PendingFile {
    /// Copies `bytes` into a new temp file in the system temp directory
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if the temp file cannot be written.
    pub fn from_bytes(original_name: impl Into<String>, bytes: &[u8]) -> StowageResult<Self> {
        Self::from_bytes_in(original_name, bytes, &PendingConfig::default())
    }

    /// Copies `bytes` into a new temp file in the configured temp directory
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if the temp file cannot be written.
    pub fn from_bytes_in(
        original_name: impl Into<String>,
        bytes: &[u8],
        config: &PendingConfig,
    ) -> StowageResult<Self> {
        let original_name = original_name.into();
        let mime_type = detect_mime_type(&original_name, bytes);
        Self::spool(original_name, mime_type, bytes, config)
    }

    /// Spools an upload to a temp file, trusting its content type when it parses
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if the temp file cannot be written.
    pub fn from_upload(upload: UploadedFile) -> StowageResult<Self> {
        Self::from_upload_in(upload, &PendingConfig::default())
    }

    /// [`from_upload`](Self::from_upload) into the configured temp directory
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if the temp file cannot be written.
    pub fn from_upload_in(upload: UploadedFile, config: &PendingConfig) -> StowageResult<Self> {
        let mime_type = upload
            .content_type
            .parse::<mime::Mime>()
            .map_or_else(
                |_| detect_mime_type(&upload.filename, &upload.data),
                |mime| mime.essence_str().to_string(),
            );
        Self::spool(upload.filename, mime_type, &upload.data, config)
    }

    /// Wraps an existing local file without taking ownership of it
    ///
    /// The original name is the file name of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if `path` cannot be read and
    /// [`StowageError::InvalidPath`] if it has no file name.
    pub fn from_path(path: impl Into<PathBuf>) -> StowageResult<Self> {
        let path = path.into();
        let original_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StowageError::InvalidPath(path.display().to_string()))?
            .to_string();
        let head = read_head(&path)?;
        Ok(Self::wrap(original_name, &head, Backing::Borrowed(path)))
    }

    /// Takes ownership of an existing temp file, deleting it on disposal
    ///
    /// The file is only taken over once it has been read, so a failure leaves
    /// it in place.
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if `path` cannot be read.
    pub fn from_temp_path(
        path: impl Into<PathBuf>,
        original_name: impl AsRef<str>,
    ) -> StowageResult<Self> {
        let path = path.into();
        let head = read_head(&path)?;
        let temp = TempPath::try_from_path(path)?;
        Ok(Self::wrap(
            client_base_name(original_name.as_ref()).to_string(),
            &head,
            Backing::Owned(temp),
        ))
    }

    fn spool(
        original_name: String,
        mime_type: String,
        bytes: &[u8],
        config: &PendingConfig,
    ) -> StowageResult<Self> {
        let original_name = client_base_name(&original_name).to_string();
        let mut builder = tempfile::Builder::new();
        builder.prefix("stowage-");
        let mut temp = match &config.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(bytes)?;
        temp.flush()?;
        let temp = temp.into_temp_path();

        tracing::debug!(
            original_name = %original_name,
            local_path = %temp.display(),
            size = bytes.len(),
            "Created pending file"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                original_name,
                mime_type,
                backing: RwLock::new(Backing::Owned(temp)),
            }),
        })
    }

    fn wrap(original_name: String, head: &[u8], backing: Backing) -> Self {
        let mime_type = detect_mime_type(&original_name, head);

        if let Some(local) = backing.path() {
            tracing::debug!(original_name = %original_name, local_path = %local.display(), "Wrapped pending file");
        }

        Self {
            inner: Arc::new(Inner {
                original_name,
                mime_type,
                backing: RwLock::new(backing),
            }),
        }
    }

    /// Name the file was uploaded with, reduced to its last segment
    #[must_use]
    pub fn original_name(&self) -> &str {
        &self.inner.original_name
    }

    /// Extension of the original name, without the dot
    #[must_use]
    pub fn original_extension(&self) -> Option<&str> {
        split_extension(&self.inner.original_name).1
    }

    /// Extension of the original name with a leading dot, or empty
    #[must_use]
    pub fn original_extension_with_dot(&self) -> String {
        self.original_extension()
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default()
    }

    /// Original name with the extension removed
    #[must_use]
    pub fn original_name_without_extension(&self) -> &str {
        split_extension(&self.inner.original_name).0
    }

    /// Location of the local copy
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Usage`] once disposed.
    pub fn local_path(&self) -> StowageResult<PathBuf> {
        self.with_local(|path| Ok(path.to_path_buf()))
    }

    /// Whether [`dispose`](Self::dispose) has been called on any clone
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        matches!(*self.inner.backing.read(), Backing::Disposed)
    }

    /// Releases the local copy
    ///
    /// Waits for in-flight reads on other clones. An owned temp file is
    /// deleted, a borrowed file is left alone. Every later read fails with a
    /// usage error. Disposing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Io`] if the temp file cannot be deleted.
    pub fn dispose(&self) -> StowageResult<()> {
        let previous = std::mem::replace(&mut *self.inner.backing.write(), Backing::Disposed);
        if let Backing::Owned(temp) = previous {
            let local = temp.to_path_buf();
            temp.close()?;
            tracing::debug!(
                original_name = %self.inner.original_name,
                local_path = %local.display(),
                "Disposed pending file"
            );
        }
        Ok(())
    }

    /// Runs `read` against the local copy while holding the read lock
    fn with_local<T>(&self, read: impl FnOnce(&Path) -> std::io::Result<T>) -> StowageResult<T> {
        let backing = self.inner.backing.read();
        let path = backing.path().ok_or_else(|| {
            StowageError::usage(format!(
                "Pending file \"{}\" has been disposed",
                self.inner.original_name
            ))
        })?;
        Ok(read(path)?)
    }

    fn is_image(&self) -> bool {
        self.inner.mime_type.starts_with("image/")
    }
}

/// Last segment of a client-supplied name
///
/// Browsers and clients may send `dir/photo.png` or `C:\fakepath\photo.png`.
/// A name with nothing after its last separator is kept whole.
fn client_base_name(name: &str) -> &str {
    match name.rsplit(['/', '\\']).next() {
        Some(base) if !base.is_empty() => base,
        _ => name,
    }
}

/// First bytes of a file, enough for magic number detection
fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    use std::io::Read;

    let mut head = Vec::with_capacity(8192);
    std::fs::File::open(path)?.take(8192).read_to_end(&mut head)?;
    Ok(head)
}

impl Node for PendingFile {
    fn path(&self) -> StowageResult<NodePath> {
        NodePath::new(&self.inner.original_name)
    }

    fn name(&self) -> StowageResult<String> {
        Ok(self.inner.original_name.clone())
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        Ok(if self.is_image() {
            NodeKind::Image
        } else {
            NodeKind::File
        })
    }

    fn exists(&self) -> StowageResult<bool> {
        let backing = self.inner.backing.read();
        Ok(backing.path().is_some_and(Path::exists))
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        self.with_local(|path| std::fs::metadata(path)?.modified())
            .map(DateTime::<Utc>::from)
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        Ok(Visibility::Private)
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        Ok(None)
    }

    fn as_file(&self) -> Option<&dyn File> {
        Some(self)
    }

    fn as_image(&self) -> Option<&dyn Image> {
        self.is_image().then_some(self as &dyn Image)
    }

    fn as_pending(&self) -> Option<&PendingFile> {
        Some(self)
    }
}

impl File for PendingFile {
    fn extension(&self) -> StowageResult<Option<String>> {
        Ok(self.original_extension().map(str::to_string))
    }

    fn name_without_extension(&self) -> StowageResult<String> {
        Ok(self.original_name_without_extension().to_string())
    }

    fn size(&self) -> StowageResult<u64> {
        self.with_local(|path| Ok(std::fs::metadata(path)?.len()))
    }

    fn checksum(&self, algorithm: Option<ChecksumAlgorithm>) -> StowageResult<String> {
        Ok(algorithm.unwrap_or_default().digest(&self.contents()?))
    }

    fn mime_type(&self) -> StowageResult<String> {
        Ok(self.inner.mime_type.clone())
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        self.with_local(|path| std::fs::read(path))
    }
}

impl Image for PendingFile {
    fn image_metadata(&self) -> StowageResult<ImageMetadata> {
        ImageMetadata::read(&self.contents()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::image::fixtures::PNG_1X1;
    use std::thread;

    #[test]
    fn test_original_name_parts() {
        let file = PendingFile::from_bytes("some CRazy file.pNg", b"x").unwrap();
        assert_eq!(file.original_name(), "some CRazy file.pNg");
        assert_eq!(file.original_extension(), Some("pNg"));
        assert_eq!(file.original_extension_with_dot(), ".pNg");
        assert_eq!(file.original_name_without_extension(), "some CRazy file");
        assert_eq!(file.path().unwrap().as_str(), "some CRazy file.pNg");
    }

    #[test]
    fn test_client_directories_are_dropped() {
        let nested = PendingFile::from_bytes("nested/dir/photo.png", b"x").unwrap();
        assert_eq!(nested.original_name(), "photo.png");
        assert_eq!(nested.original_name_without_extension(), "photo");
        assert_eq!(nested.path().unwrap().as_str(), "photo.png");

        let windows = PendingFile::from_upload(UploadedFile::new(
            "C:\\fakepath\\Holiday.JPG",
            "image/jpeg",
            vec![0xFF, 0xD8, 0xFF],
        ))
        .unwrap();
        assert_eq!(windows.original_name(), "Holiday.JPG");
        assert_eq!(windows.original_extension_with_dot(), ".JPG");

        assert_eq!(client_base_name("trailing/"), "trailing/");
        assert_eq!(
            UploadedFile::new("v1.2/README", "", vec![]).extension(),
            None
        );
    }

    #[test]
    fn test_no_extension() {
        let file = PendingFile::from_bytes("README", b"x").unwrap();
        assert_eq!(file.original_extension(), None);
        assert_eq!(file.original_extension_with_dot(), "");
    }

    #[test]
    fn test_reads_local_copy() {
        let file = PendingFile::from_bytes("a.txt", b"hello").unwrap();
        assert_eq!(file.contents().unwrap(), b"hello");
        assert_eq!(file.size().unwrap(), 5);
        assert_eq!(
            file.checksum(None).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(file.mime_type().unwrap(), "text/plain");
        assert!(file.exists().unwrap());
        assert_eq!(file.filesystem_name().unwrap(), None);
    }

    #[test]
    fn test_temp_dir_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = PendingConfig {
            temp_dir: Some(dir.path().to_path_buf()),
        };
        let file = PendingFile::from_bytes_in("a.bin", b"1", &config).unwrap();
        assert!(file.local_path().unwrap().starts_with(dir.path()));
    }

    #[test]
    fn test_dispose_deletes_owned_temp_file() {
        let file = PendingFile::from_bytes("a.txt", b"hello").unwrap();
        let local = file.local_path().unwrap();
        let clone = file.clone();

        file.dispose().unwrap();
        assert!(!local.exists());
        assert!(clone.is_disposed());
        assert!(matches!(clone.contents(), Err(StowageError::Usage(_))));
        assert!(!clone.exists().unwrap());
        file.dispose().unwrap();
    }

    #[test]
    fn test_drop_of_last_clone_deletes_temp_file() {
        let file = PendingFile::from_bytes("a.txt", b"hello").unwrap();
        let local = file.local_path().unwrap();
        let clone = file.clone();
        drop(file);
        assert!(local.exists());
        drop(clone);
        assert!(!local.exists());
    }

    #[test]
    fn test_borrowed_file_survives_disposal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Holiday Photo.png");
        std::fs::write(&path, PNG_1X1).unwrap();

        let file = PendingFile::from_path(&path).unwrap();
        assert_eq!(file.original_name(), "Holiday Photo.png");
        assert_eq!(file.kind().unwrap(), NodeKind::Image);
        assert_eq!(file.ensure_image().unwrap().width().unwrap(), 1);

        file.dispose().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_from_temp_path_takes_ownership() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload-1234");
        std::fs::write(&path, b"data").unwrap();

        let file = PendingFile::from_temp_path(&path, "notes.txt").unwrap();
        assert_eq!(file.original_name(), "notes.txt");
        file.dispose().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_unreadable_temp_path_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-file");
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(
            PendingFile::from_temp_path(&path, "notes.txt"),
            Err(StowageError::Io(_))
        ));
        assert!(path.exists());
    }

    #[test]
    fn test_from_path_missing_file() {
        assert!(matches!(
            PendingFile::from_path("/definitely/not/here.txt"),
            Err(StowageError::Io(_))
        ));
    }

    #[test]
    fn test_upload_content_type_wins() {
        let upload = UploadedFile::new("data", "application/json", b"{}".to_vec());
        let file = PendingFile::from_upload(upload).unwrap();
        assert_eq!(file.mime_type().unwrap(), "application/json");

        let unknown = UploadedFile::new("pic.png", "", PNG_1X1.to_vec());
        let file = PendingFile::from_upload(unknown).unwrap();
        assert_eq!(file.mime_type().unwrap(), "image/png");
    }

    #[test]
    fn test_concurrent_reads() {
        let file = PendingFile::from_bytes("a.txt", b"shared").unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let file = file.clone();
                thread::spawn(move || file.contents().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), b"shared");
        }
    }

    #[test]
    fn test_uploaded_file_validation() {
        let file = UploadedFile::new("photo.jpg", "image/jpeg", vec![1, 2, 3]);
        assert!(file.validate_size(3).is_ok());
        assert!(matches!(
            file.validate_size(2),
            Err(StowageError::FileSizeExceeded { actual: 3, limit: 2 })
        ));
        assert!(file.validate_mime(&["image/jpeg", "image/png"]).is_ok());
        assert!(matches!(
            file.validate_mime(&["image/png"]),
            Err(StowageError::InvalidMimeType { .. })
        ));
        assert!(file.validate_mime(&["image/*"]).is_ok());
        assert!(file.validate_mime(&["video/*", "text/plain"]).is_err());
    }

    #[test]
    fn test_uploaded_file_extension() {
        assert_eq!(UploadedFile::new("archive.tar.gz", "", vec![]).extension(), Some("gz"));
        assert_eq!(UploadedFile::new("README", "", vec![]).extension(), None);
    }
}
