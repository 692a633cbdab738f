//! Collaborator traits consumed by the handle layer.

use crate::error::BackendResult;
use crate::path::Path;
use serde_json::Value;

/// The document model a store addresses.
///
/// The handle layer never interprets the values it reads. All mutation goes
/// through [`ModelBackend::invoke`], which is the only way application code
/// can change data.
///
/// # Invariants
///
/// - `read` has no side effects
/// - `invoke` returns whatever the method produces; errors are returned, not
///   swallowed
pub trait ModelBackend: Send + Sync {
    /// Returns the current value at `path`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, path: &Path) -> BackendResult<Option<Value>>;

    /// Executes the named method against `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the method is unknown, the arguments do not fit,
    /// or the value at `path` has the wrong shape.
    fn invoke(&self, path: &Path, method: &str, args: &[Value]) -> BackendResult<Value>;
}

/// A live cursor over a backend-computed result set.
///
/// A query has two views: an ordered list of matching ids, and an optional
/// "extra" payload (a count, an aggregate). Both are materialised in the
/// model at [`Query::ids_segments`] and [`Query::extra_segments`] so that
/// handles can address them like any other data.
pub trait Query: Send + Sync {
    /// Returns the materialised primary result.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn get(&self) -> BackendResult<Value>;

    /// Returns the ordered ids of the matching documents, without duplicates.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn get_ids(&self) -> BackendResult<Vec<String>>;

    /// Returns the extra payload, if the query has one.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn get_extra(&self) -> BackendResult<Option<Value>>;

    /// Enters live-update mode.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn subscribe(&self) -> BackendResult<()>;

    /// Leaves live-update mode.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn unsubscribe(&self) -> BackendResult<()>;

    /// Loads the result set once.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn fetch(&self) -> BackendResult<()>;

    /// Releases a previous [`Query::fetch`].
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    fn unfetch(&self) -> BackendResult<()>;

    /// Path at which the ids list lives in the model.
    fn ids_segments(&self) -> Path;

    /// Path at which the extra payload lives in the model.
    fn extra_segments(&self) -> Path;

    /// Returns true if the query's content is its extra payload rather than
    /// an id-indexed collection.
    fn is_extra(&self) -> bool {
        false
    }
}
