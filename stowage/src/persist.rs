//! Moving pending uploads into a filesystem

use crate::error::StowageResult;
use crate::filesystem::Filesystem;
use crate::generator::PathGeneratorRegistry;
use crate::namer::Namer;
use crate::node::{File, Node, PendingFile};
use crate::value::Context;

/// Names `pending` with `namer`, writes it to `filesystem` and returns the
/// stored node
///
/// The pending file is left intact; dispose it once the stored node is
/// committed.
///
/// # Errors
///
/// Fails if the path cannot be generated, the pending file cannot be read
/// (for example after disposal) or the filesystem rejects the write.
///
/// # Examples
///
/// ```rust
/// use stowage::context;
/// use stowage::filesystem::{Filesystem, MemoryFilesystem};
/// use stowage::generator::PathGeneratorRegistry;
/// use stowage::namer::Namer;
/// use stowage::node::{Node, PendingFile};
/// use stowage::persist::persist;
///
/// # fn example() -> stowage::StowageResult<()> {
/// let fs = MemoryFilesystem::new("public");
/// let upload = PendingFile::from_bytes("Résumé.PDF", b"%PDF-1.7")?;
///
/// let stored = persist(
///     &fs,
///     &PathGeneratorRegistry::new(),
///     &Namer::expression("cv/{userId}/{name}{ext}"),
///     &upload,
///     &context! { "userId" => 42 },
/// )?;
/// assert!(stored.exists()?);
/// upload.dispose()?;
/// # Ok(())
/// # }
/// ```
pub fn persist(
    filesystem: &dyn Filesystem,
    registry: &PathGeneratorRegistry,
    namer: &Namer,
    pending: &PendingFile,
    context: &Context,
) -> StowageResult<Box<dyn Node>> {
    let path = registry.generate(namer, pending, context)?;
    let bytes = pending.contents()?;
    let stored = filesystem.write(&path, &bytes)?;

    tracing::debug!(
        filesystem = filesystem.name(),
        original = pending.original_name(),
        path = %path,
        size = bytes.len(),
        "Persisted pending file"
    );
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::error::StowageError;
    use crate::filesystem::MemoryFilesystem;

    #[test]
    fn test_persist_writes_under_generated_path() {
        let fs = MemoryFilesystem::new("public");
        let upload = PendingFile::from_bytes("some CRazy file.pNg", b"not really a png").unwrap();

        let stored = persist(
            &fs,
            &PathGeneratorRegistry::new(),
            &Namer::expression("foo/{objectId}-{name}{ext}"),
            &upload,
            &context! { "objectId" => 1 },
        )
        .unwrap();

        assert_eq!(stored.path().unwrap().as_str(), "foo/1-some-crazy-file.png");
        assert_eq!(fs.read("foo/1-some-crazy-file.png").unwrap(), b"not really a png");
        assert_eq!(stored.filesystem_name().unwrap().as_deref(), Some("public"));
        assert!(!upload.is_disposed());
    }

    #[test]
    fn test_disposed_pending_file_is_rejected() {
        let fs = MemoryFilesystem::new("public");
        let upload = PendingFile::from_bytes("a.txt", b"a").unwrap();
        upload.dispose().unwrap();

        let result = persist(
            &fs,
            &PathGeneratorRegistry::new(),
            &Namer::expression("{name}{ext}"),
            &upload,
            &Context::new(),
        );
        assert!(matches!(result, Err(StowageError::Usage(_))));
        assert!(fs.is_empty());
    }
}
