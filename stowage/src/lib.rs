//! stowage: storage-agnostic file nodes with expression-based path naming
//!
//! Stowage models files, images and directories as nodes that live in some
//! filesystem, and decides where new files go with small naming expressions.
//!
//! # Design Principles
//!
//! 1. **Nodes over paths**: files, images and directories share one trait
//!    family whatever backs them
//! 2. **Lazy by default**: a [`LazyNode`](node::LazyNode) touches its
//!    filesystem on first use only
//! 3. **Declarative naming**: a [`Namer`](namer::Namer) says how a path is
//!    derived and the [`PathGeneratorRegistry`](generator::PathGeneratorRegistry)
//!    carries it out
//!
//! # Quick Start
//!
//! ```rust
//! use stowage::prelude::*;
//!
//! # fn main() -> stowage::StowageResult<()> {
//! let fs = MemoryFilesystem::new("public");
//! let registry = PathGeneratorRegistry::new();
//!
//! // An upload waiting to be stored
//! let upload = PendingFile::from_bytes("some CRazy file.pNg", b"...")?;
//!
//! let namer = Namer::expression("foo/{objectId}-{name}{ext}");
//! let stored = persist(&fs, &registry, &namer, &upload, &context! { "objectId" => 1 })?;
//! assert_eq!(stored.path()?.as_str(), "foo/1-some-crazy-file.png");
//!
//! upload.dispose()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Path Expressions
//!
//! | placeholder | value |
//! |-------------|-------|
//! | `{name}` | slug of the name without extension |
//! | `{ext}` | lowercased extension with its dot, or empty |
//! | `{checksum}`, `{checksum:sha256:8}` | hex digest of the contents |
//! | `{rand}`, `{rand(12)}` | random lowercase alphanumerics |
//! | `{this.slug}`, `{items[0]}` | context lookups |
//! | `{title\|slug}` | transforms (`slug`, `lower`, `upper`) |
//!
//! Configuration is loaded through [`config::StowageConfig`] and logging
//! goes through `tracing`; see [`observability::init`].

// Lint configuration is handled at the workspace level in Cargo.toml
#![allow(clippy::missing_errors_doc)]

extern crate self as stowage;

pub mod config;
pub mod error;
pub mod expression;
pub mod filesystem;
pub mod generator;
pub mod namer;
pub mod node;
pub mod observability;
pub mod persist;
pub mod value;

pub use error::{StowageError, StowageResult};
pub use stowage_macros::Accessible;

pub mod prelude {
    //! Convenience re-exports for common types and traits
    //!
    //! # Examples
    //!
    //! ```rust
    //! use stowage::prelude::*;
    //! ```

    pub use crate::config::StowageConfig;
    pub use crate::context;
    pub use crate::error::{StowageError, StowageResult};
    pub use crate::expression::ExpressionEngine;
    pub use crate::filesystem::{Filesystem, FilesystemProvider, FilesystemRegistry, MemoryFilesystem};
    pub use crate::generator::{PathGenerator, PathGeneratorRegistry};
    pub use crate::namer::Namer;
    pub use crate::node::{
        ChecksumAlgorithm, Directory, File, Image, LazyNode, Node, NodeKind, NodePath, PendingFile,
        Placeholder, UploadedFile, Visibility,
    };
    pub use crate::persist::persist;
    pub use crate::value::{Accessible, Context, Value};
    pub use stowage_macros::Accessible;
}
