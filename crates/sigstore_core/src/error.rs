//! Error types for handle operations.

use sigstore_backend::BackendError;
use std::fmt;
use thiserror::Error;

/// Result type for handle operations.
pub type SignalResult<T> = Result<T, SignalError>;

/// Message returned when a property is assigned through a handle.
pub const WRITE_NOT_ALLOWED: &str = "You can't assign to a property of a model directly. \
     Instead use: await $model.setDiffDeep(value) / .setEach(objectValue)";

/// Message returned when a property is deleted through a handle.
pub const DELETE_NOT_ALLOWED: &str =
    "You can't delete a property of a model directly. Instead use: await $model.del()";

/// The direct mutation a handle refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Property assignment.
    Write,
    /// Property deletion.
    Delete,
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Delete => f.write_str("delete"),
        }
    }
}

/// Errors that can occur when operating on a handle.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Direct assignment or deletion through a handle.
    ///
    /// Signals programmer error; the sanctioned model API is named in the
    /// message.
    #[error("{message}")]
    MutationNotAllowed {
        /// Which mutation was attempted.
        operation: Mutation,
        /// Message naming the sanctioned alternative.
        message: &'static str,
    },

    /// A handle was called in a way it cannot be called.
    #[error("invalid call: {message}")]
    InvalidCall {
        /// Description of the problem.
        message: String,
    },

    /// A chained access expected a handle but the read produced something else.
    #[error("key {key} does not address a handle")]
    NotAHandle {
        /// The key that was read.
        key: String,
    },

    /// Error raised by the model or query backend, passed through unchanged.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SignalError {
    /// Creates the error for a refused direct write.
    pub fn write_not_allowed() -> Self {
        Self::MutationNotAllowed {
            operation: Mutation::Write,
            message: WRITE_NOT_ALLOWED,
        }
    }

    /// Creates the error for a refused direct delete.
    pub fn delete_not_allowed() -> Self {
        Self::MutationNotAllowed {
            operation: Mutation::Delete,
            message: DELETE_NOT_ALLOWED,
        }
    }

    /// Creates an invalid call error.
    pub fn invalid_call(message: impl Into<String>) -> Self {
        Self::InvalidCall {
            message: message.into(),
        }
    }

    /// Creates a not-a-handle error.
    pub fn not_a_handle(key: impl fmt::Display) -> Self {
        Self::NotAHandle {
            key: key.to_string(),
        }
    }

    /// Returns true for [`SignalError::MutationNotAllowed`].
    pub fn is_mutation_not_allowed(&self) -> bool {
        matches!(self, Self::MutationNotAllowed { .. })
    }
}
