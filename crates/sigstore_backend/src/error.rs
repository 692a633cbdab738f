//! Error types for backend operations.

use crate::path::Path;
use thiserror::Error;

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by a model or query backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Nothing exists at a path that must exist for the operation.
    #[error("nothing found at path [{path}]")]
    NotFound {
        /// The path that was looked up.
        path: Path,
    },

    /// The value at a path has the wrong shape for the operation.
    #[error("type mismatch at path [{path}]: expected {expected}")]
    TypeMismatch {
        /// The path being operated on.
        path: Path,
        /// What the operation needed.
        expected: &'static str,
    },

    /// The backend does not implement the requested method.
    #[error("unknown model method: {method}")]
    UnknownMethod {
        /// Name of the method.
        method: String,
    },

    /// The arguments do not fit the method.
    #[error("invalid arguments for {method}: {message}")]
    InvalidArguments {
        /// Name of the method.
        method: String,
        /// Description of the problem.
        message: String,
    },

    /// An array index is past the end.
    #[error("index {index} out of range for length {len} at path [{path}]")]
    IndexOutOfRange {
        /// The array path.
        path: Path,
        /// The requested index.
        index: usize,
        /// The array length.
        len: usize,
    },

    /// The backend has been shut down.
    #[error("backend is closed")]
    Closed,

    /// JSON conversion error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Creates a not-found error.
    pub fn not_found(path: &Path) -> Self {
        Self::NotFound { path: path.clone() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(path: &Path, expected: &'static str) -> Self {
        Self::TypeMismatch {
            path: path.clone(),
            expected,
        }
    }

    /// Creates an unknown method error.
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates an invalid arguments error.
    pub fn invalid_arguments(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            method: method.into(),
            message: message.into(),
        }
    }

    /// Creates an index out of range error.
    pub fn index_out_of_range(path: &Path, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange {
            path: path.clone(),
            index,
            len,
        }
    }
}
