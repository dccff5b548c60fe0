//! Nodes that bind to their filesystem on first use
//!
//! A [`LazyNode`] starts unresolved with a path (or a
//! function producing one) and a way to obtain a filesystem. Asking for the
//! path never touches the filesystem. Asking whether the node exists binds
//! the filesystem. Anything that needs metadata or content fetches the
//! concrete node from the filesystem and caches it for the lifetime of the
//! lazy node.
//!
//! ```text
//! Unresolved --exists/filesystem_name--> Bound --metadata/content--> Resolved
//!      \_____________________metadata/content__________________________/
//! ```
//!
//! Lazy nodes are `Send` but `!Sync`: move them between threads freely, share
//! one across threads only behind your own lock.

use super::{
    type_mismatch, ChecksumAlgorithm, Directory, File, Image, ImageMetadata, Node, NodeKind,
    NodePath, Visibility,
};
use crate::error::{StowageError, StowageResult};
use crate::filesystem::{Filesystem, FilesystemProvider};
use chrono::{DateTime, Utc};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::sync::Arc;

type PathSupplier = Box<dyn Fn() -> StowageResult<String> + Send>;
type FilesystemSupplier = Box<dyn Fn() -> StowageResult<Arc<dyn Filesystem>> + Send>;

/// Where a lazy node's path comes from
pub enum PathSource {
    /// Known up front
    Literal(NodePath),
    /// Computed on first access, e.g. by a namer
    Deferred(PathSupplier),
}

impl PathSource {
    /// A literal path
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `path` does not normalize.
    pub fn literal(path: &str) -> StowageResult<Self> {
        Ok(Self::Literal(NodePath::new(path)?))
    }

    /// A path computed by `supplier` on first access
    pub fn deferred(supplier: impl Fn() -> StowageResult<String> + Send + 'static) -> Self {
        Self::Deferred(Box::new(supplier))
    }
}

impl From<NodePath> for PathSource {
    fn from(path: NodePath) -> Self {
        Self::Literal(path)
    }
}

impl fmt::Debug for PathSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(path) => f.debug_tuple("Literal").field(path).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Where a lazy node's filesystem comes from
pub enum FilesystemSource {
    /// A filesystem already at hand
    Instance(Arc<dyn Filesystem>),
    /// Looked up by name, or the provider's default when `name` is `None`
    Provider {
        /// Provider asked on first use
        provider: Arc<dyn FilesystemProvider>,
        /// Filesystem name
        name: Option<String>,
    },
    /// Produced by an arbitrary function on first use
    Deferred(FilesystemSupplier),
}

impl FilesystemSource {
    /// Wraps a filesystem
    pub fn instance(filesystem: impl Filesystem + 'static) -> Self {
        Self::Instance(Arc::new(filesystem))
    }

    /// Looks up `name` in `provider` on first use
    pub fn provider(provider: Arc<dyn FilesystemProvider>, name: Option<&str>) -> Self {
        Self::Provider {
            provider,
            name: name.map(str::to_string),
        }
    }

    /// Calls `supplier` on first use
    pub fn deferred(
        supplier: impl Fn() -> StowageResult<Arc<dyn Filesystem>> + Send + 'static,
    ) -> Self {
        Self::Deferred(Box::new(supplier))
    }

    fn obtain(&self) -> StowageResult<Arc<dyn Filesystem>> {
        match self {
            Self::Instance(filesystem) => Ok(Arc::clone(filesystem)),
            Self::Provider {
                provider,
                name: Some(name),
            } => provider.get(name),
            Self::Provider {
                provider,
                name: None,
            } => provider.default_filesystem(),
            Self::Deferred(supplier) => supplier(),
        }
    }
}

impl From<Arc<dyn Filesystem>> for FilesystemSource {
    fn from(filesystem: Arc<dyn Filesystem>) -> Self {
        Self::Instance(filesystem)
    }
}

impl fmt::Debug for FilesystemSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance(filesystem) => f.debug_tuple("Instance").field(&filesystem.name()).finish(),
            Self::Provider { name, .. } => f.debug_struct("Provider").field("name", name).finish_non_exhaustive(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

enum State {
    /// Nothing obtained yet
    Unresolved {
        path: PathSource,
        filesystem: Option<FilesystemSource>,
    },
    /// Filesystem obtained, concrete node not fetched
    Bound {
        path: NodePath,
        filesystem: Arc<dyn Filesystem>,
    },
    /// Concrete node cached
    Resolved {
        path: NodePath,
        filesystem: Arc<dyn Filesystem>,
        delegate: Box<dyn Node>,
    },
}

/// A node reference resolved on first use
///
/// # Examples
///
/// ```rust
/// use stowage::filesystem::{Filesystem, MemoryFilesystem};
/// use stowage::node::{File, FilesystemSource, LazyNode, Node};
///
/// # fn example() -> stowage::StowageResult<()> {
/// let fs = MemoryFilesystem::new("public");
/// fs.write("avatars/1.png", b"not really a png")?;
///
/// let mut avatar = LazyNode::file("avatars/1.png")?;
/// assert_eq!(avatar.path()?.as_str(), "avatars/1.png");
///
/// avatar.set_filesystem(FilesystemSource::instance(fs))?;
/// assert_eq!(avatar.size()?, 16);
/// assert!(avatar.is_resolved());
/// # Ok(())
/// # }
/// ```
pub struct LazyNode {
    expected: Option<NodeKind>,
    state: RefCell<State>,
}

impl LazyNode {
    /// Lazy node of any kind at a literal path
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `path` does not normalize.
    pub fn new(path: &str) -> StowageResult<Self> {
        Ok(Self::from_source(PathSource::literal(path)?))
    }

    /// Lazy node whose path is computed on first access
    pub fn deferred(supplier: impl Fn() -> StowageResult<String> + Send + 'static) -> Self {
        Self::from_source(PathSource::deferred(supplier))
    }

    /// Lazy node at a literal path that must resolve to a file
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `path` does not normalize.
    pub fn file(path: &str) -> StowageResult<Self> {
        Ok(Self::new(path)?.expecting(NodeKind::File))
    }

    /// Lazy node at a literal path that must resolve to an image
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `path` does not normalize.
    pub fn image(path: &str) -> StowageResult<Self> {
        Ok(Self::new(path)?.expecting(NodeKind::Image))
    }

    /// Lazy node at a literal path that must resolve to a directory
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::InvalidPath`] if `path` does not normalize.
    pub fn directory(path: &str) -> StowageResult<Self> {
        Ok(Self::new(path)?.expecting(NodeKind::Directory))
    }

    fn from_source(path: PathSource) -> Self {
        Self {
            expected: None,
            state: RefCell::new(State::Unresolved {
                path,
                filesystem: None,
            }),
        }
    }

    /// Requires the resolved node to be of `kind`
    ///
    /// An image satisfies [`NodeKind::File`].
    #[must_use]
    pub const fn expecting(mut self, kind: NodeKind) -> Self {
        self.expected = Some(kind);
        self
    }

    /// Attaches the filesystem while building
    #[must_use]
    pub fn with_filesystem(mut self, source: impl Into<FilesystemSource>) -> Self {
        if let State::Unresolved { filesystem, .. } = self.state.get_mut() {
            *filesystem = Some(source.into());
        }
        self
    }

    /// Attaches the filesystem; the last call before resolution wins
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Usage`] once the filesystem has been obtained.
    pub fn set_filesystem(&mut self, source: impl Into<FilesystemSource>) -> StowageResult<()> {
        match self.state.get_mut() {
            State::Unresolved { filesystem, .. } => {
                if filesystem.is_some() {
                    tracing::trace!("Replacing filesystem of unresolved lazy node");
                }
                *filesystem = Some(source.into());
                Ok(())
            }
            State::Bound { path, .. } | State::Resolved { path, .. } => Err(StowageError::usage(
                format!("Cannot attach a filesystem to lazy node \"{path}\" after it has been resolved"),
            )),
        }
    }

    /// Replaces the path source
    ///
    /// # Errors
    ///
    /// Returns [`StowageError::Usage`] once the filesystem has been obtained.
    pub fn set_path(&mut self, source: impl Into<PathSource>) -> StowageResult<()> {
        match self.state.get_mut() {
            State::Unresolved { path, .. } => {
                *path = source.into();
                Ok(())
            }
            State::Bound { path, .. } | State::Resolved { path, .. } => Err(StowageError::usage(
                format!("Cannot change the path of lazy node \"{path}\" after it has been resolved"),
            )),
        }
    }

    /// Whether the concrete node has been fetched
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(*self.state.borrow(), State::Resolved { .. })
    }

    /// Obtains the filesystem without fetching the concrete node
    fn bind(&self) -> StowageResult<(NodePath, Arc<dyn Filesystem>)> {
        let path = self.path()?;

        let filesystem = match &*self.state.borrow() {
            State::Bound { filesystem, .. } | State::Resolved { filesystem, .. } => {
                return Ok((path, Arc::clone(filesystem)));
            }
            State::Unresolved {
                filesystem: Some(source),
                ..
            } => source.obtain()?,
            State::Unresolved {
                filesystem: None, ..
            } => {
                return Err(StowageError::usage(format!(
                    "A filesystem must be attached to lazy node \"{path}\" before use"
                )));
            }
        };

        tracing::debug!(path = %path, filesystem = filesystem.name(), "Bound lazy node");
        *self.state.borrow_mut() = State::Bound {
            path: path.clone(),
            filesystem: Arc::clone(&filesystem),
        };
        Ok((path, filesystem))
    }

    /// Fetches and caches the concrete node
    fn resolve(&self) -> StowageResult<Ref<'_, dyn Node>> {
        if !self.is_resolved() {
            let (path, filesystem) = self.bind()?;
            let delegate = filesystem.node(path.as_str())?;
            match self.expected {
                Some(NodeKind::File) => {
                    delegate.ensure_file()?;
                }
                Some(NodeKind::Image) => {
                    delegate.ensure_image()?;
                }
                Some(NodeKind::Directory) => {
                    delegate.ensure_directory()?;
                }
                None => {}
            }

            tracing::debug!(path = %path, filesystem = filesystem.name(), "Resolved lazy node");
            *self.state.borrow_mut() = State::Resolved {
                path,
                filesystem,
                delegate,
            };
        }

        Ref::filter_map(self.state.borrow(), |state| match state {
            State::Resolved { delegate, .. } => Some(delegate.as_ref()),
            _ => None,
        })
        .map_err(|_| StowageError::usage("Lazy node did not resolve"))
    }

    fn narrows_to(&self, kind: NodeKind) -> bool {
        let accepts = |actual: NodeKind| match kind {
            NodeKind::File => actual.is_file(),
            other => actual == other,
        };
        match self.expected {
            Some(expected) => accepts(expected),
            None => self
                .resolve()
                .and_then(|delegate| delegate.kind())
                .is_ok_and(accepts),
        }
    }

    /// Narrowing for untyped lazies resolves first, so a missing filesystem
    /// surfaces as a usage error instead of a type mismatch
    fn ensure(&self, kind: NodeKind) -> StowageResult<()> {
        if self.expected.is_none() {
            self.resolve()?;
        }
        if self.narrows_to(kind) {
            Ok(())
        } else {
            Err(type_mismatch(kind, self))
        }
    }
}

impl fmt::Debug for LazyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("LazyNode");
        out.field("expected", &self.expected);
        match self.state.try_borrow() {
            Ok(state) => match &*state {
                State::Unresolved { path, filesystem } => out
                    .field("state", &"unresolved")
                    .field("path", path)
                    .field("filesystem", filesystem),
                State::Bound { path, filesystem } => out
                    .field("state", &"bound")
                    .field("path", path)
                    .field("filesystem", &filesystem.name()),
                State::Resolved {
                    path, filesystem, ..
                } => out
                    .field("state", &"resolved")
                    .field("path", path)
                    .field("filesystem", &filesystem.name()),
            },
            Err(_) => out.field("state", &"<resolving>"),
        };
        out.finish()
    }
}

impl Node for LazyNode {
    /// Never touches the filesystem; a deferred path is computed once and cached
    fn path(&self) -> StowageResult<NodePath> {
        let computed = match &*self.state.borrow() {
            State::Unresolved {
                path: PathSource::Literal(path),
                ..
            }
            | State::Bound { path, .. }
            | State::Resolved { path, .. } => return Ok(path.clone()),
            State::Unresolved {
                path: PathSource::Deferred(supplier),
                ..
            } => supplier()?,
        };

        let path = NodePath::new(computed)?;
        if let State::Unresolved { path: source, .. } = &mut *self.state.borrow_mut() {
            *source = PathSource::Literal(path.clone());
        }
        Ok(path)
    }

    fn kind(&self) -> StowageResult<NodeKind> {
        self.resolve()?.kind()
    }

    fn exists(&self) -> StowageResult<bool> {
        let (path, filesystem) = self.bind()?;
        filesystem.exists(path.as_str())
    }

    fn last_modified(&self) -> StowageResult<DateTime<Utc>> {
        self.resolve()?.last_modified()
    }

    fn visibility(&self) -> StowageResult<Visibility> {
        self.resolve()?.visibility()
    }

    fn filesystem_name(&self) -> StowageResult<Option<String>> {
        let (_, filesystem) = self.bind()?;
        Ok(Some(filesystem.name().to_string()))
    }

    fn as_file(&self) -> Option<&dyn File> {
        self.narrows_to(NodeKind::File).then_some(self as &dyn File)
    }

    fn as_directory(&self) -> Option<&dyn Directory> {
        self.narrows_to(NodeKind::Directory)
            .then_some(self as &dyn Directory)
    }

    fn as_image(&self) -> Option<&dyn Image> {
        self.narrows_to(NodeKind::Image).then_some(self as &dyn Image)
    }

    fn ensure_file(&self) -> StowageResult<&dyn File> {
        self.ensure(NodeKind::File)?;
        Ok(self)
    }

    fn ensure_directory(&self) -> StowageResult<&dyn Directory> {
        self.ensure(NodeKind::Directory)?;
        Ok(self)
    }

    fn ensure_image(&self) -> StowageResult<&dyn Image> {
        self.ensure(NodeKind::Image)?;
        Ok(self)
    }
}

impl File for LazyNode {
    fn size(&self) -> StowageResult<u64> {
        self.resolve()?.ensure_file()?.size()
    }

    fn checksum(&self, algorithm: Option<ChecksumAlgorithm>) -> StowageResult<String> {
        self.resolve()?.ensure_file()?.checksum(algorithm)
    }

    fn mime_type(&self) -> StowageResult<String> {
        self.resolve()?.ensure_file()?.mime_type()
    }

    fn contents(&self) -> StowageResult<Vec<u8>> {
        self.resolve()?.ensure_file()?.contents()
    }
}

impl Image for LazyNode {
    fn image_metadata(&self) -> StowageResult<ImageMetadata> {
        self.resolve()?.ensure_image()?.image_metadata()
    }
}

impl Directory for LazyNode {
    fn children(&self) -> StowageResult<Vec<Box<dyn Node>>> {
        self.resolve()?.ensure_directory()?.children()
    }
}
