//! Error types and error handling
//!
//! Every failure in this crate is local and synchronous: nothing is retried
//! and no partial result is returned. Callers translate these variants into
//! their own domain responses.

use thiserror::Error;

/// Errors raised by nodes, namers and path generators
#[derive(Debug, Error)]
pub enum StowageError {
    /// A template variable, method or property chain could not be resolved
    #[error("Cannot resolve \"{token}\": {reason}")]
    Resolution {
        /// The offending token (variable, segment or transform)
        token: String,
        /// Why resolution failed
        reason: String,
    },

    /// An operation required a different node type
    #[error("Expected {expected} at \"{path}\", found {actual}")]
    TypeMismatch {
        /// Required node kind
        expected: &'static str,
        /// Actual node kind
        actual: &'static str,
        /// Path of the node
        path: String,
    },

    /// A namer id or scheme is not registered
    #[error("Configuration error: {0}")]
    Config(String),

    /// The API was used in an invalid way (programming error)
    #[error("Usage error: {0}")]
    Usage(String),

    /// Content or metadata was requested from a placeholder node
    #[error("This node is a placeholder only and has no {0}")]
    Placeholder(&'static str),

    /// Node not found in its filesystem
    #[error("Not found: {0}")]
    NotFound(String),

    /// Path failed normalization
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Upload exceeds the size limit
    #[error("File size {actual} exceeds limit of {limit} bytes")]
    FileSizeExceeded {
        /// Actual file size
        actual: u64,
        /// Maximum allowed size
        limit: u64,
    },

    /// Upload content type is not allowed
    #[error("Invalid MIME type: expected {expected:?}, got {actual}")]
    InvalidMimeType {
        /// Allowed MIME types
        expected: Vec<String>,
        /// Actual MIME type
        actual: String,
    },

    /// The template engine failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// Image metadata could not be read
    #[error("Image error: {0}")]
    Image(String),

    /// I/O error on a local file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for stowage operations
pub type StowageResult<T> = Result<T, StowageError>;

impl StowageError {
    /// Builds a [`StowageError::Resolution`]
    pub fn resolution(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Builds a [`StowageError::Usage`]
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Whether this error signals a programming error by the caller
    #[must_use]
    pub const fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_) | Self::Placeholder(_))
    }
}
