//! The store: owns the model, the registry and the read observer.

use crate::config::StoreConfig;
use crate::handle::Handle;
use crate::observer::ReadObserver;
use crate::query::QueryBinding;
use crate::registry::Registry;
use parking_lot::RwLock;
use sigstore_backend::{ModelBackend, Path, Query};
use std::fmt;
use std::sync::Arc;

/// Shared state behind a [`SignalStore`] and all of its handles.
pub(crate) struct StoreInner {
    pub(crate) model: Arc<dyn ModelBackend>,
    pub(crate) config: StoreConfig,
    pub(crate) registry: Registry,
    observer: RwLock<Option<Arc<dyn ReadObserver>>>,
}

impl StoreInner {
    /// Returns the live handle for `path`/`binding`, creating it if needed.
    pub(crate) fn handle(self: &Arc<Self>, path: Path, binding: Option<QueryBinding>) -> Handle {
        self.registry.handle(self, path, binding)
    }

    /// Returns the installed observer, if any.
    ///
    /// The observer is cloned out so that it runs without the lock held.
    pub(crate) fn observer(&self) -> Option<Arc<dyn ReadObserver>> {
        self.observer.read().clone()
    }
}

/// Entry point for path-addressed handles over a document model.
///
/// Cloning a store is cheap; clones share the registry, so a path yields
/// the same handle through any clone.
///
/// # Example
///
/// ```rust
/// use sigstore_core::SignalStore;
/// use sigstore_backend::{path, MemoryModel};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let store = SignalStore::new(Arc::new(MemoryModel::new()));
/// let root = store.root();
/// let user = root.dig(["$session", "userId"]).unwrap();
/// assert_eq!(user.path(), &path!["_session", "userId"]);
/// assert!(user.ptr_eq(&store.handle(path!["_session", "userId"])));
///
/// user.invoke_method("set", vec![json!("u1")]).unwrap();
/// assert_eq!(user.value().unwrap(), Some(json!("u1")));
/// ```
#[derive(Clone)]
pub struct SignalStore {
    inner: Arc<StoreInner>,
}

impl SignalStore {
    /// Creates a store over `model` with the default configuration.
    pub fn new(model: Arc<dyn ModelBackend>) -> Self {
        Self::with_config(model, StoreConfig::default())
    }

    /// Creates a store over `model` with a custom configuration.
    pub fn with_config(model: Arc<dyn ModelBackend>, config: StoreConfig) -> Self {
        let registry = Registry::new(config.prune_threshold);
        Self {
            inner: Arc::new(StoreInner {
                model,
                config,
                registry,
                observer: RwLock::new(None),
            }),
        }
    }

    /// Installs `observer` and returns the store.
    #[must_use]
    pub fn with_observer(self, observer: Arc<dyn ReadObserver>) -> Self {
        self.set_observer(observer);
        self
    }

    /// Installs `observer`, replacing any previous one.
    pub fn set_observer(&self, observer: Arc<dyn ReadObserver>) {
        *self.inner.observer.write() = Some(observer);
    }

    /// Removes the read observer.
    pub fn clear_observer(&self) {
        *self.inner.observer.write() = None;
    }

    /// Returns the handle of the whole document.
    pub fn root(&self) -> Handle {
        self.handle(Path::root())
    }

    /// Returns the handle for `path`.
    ///
    /// While any clone of the returned handle is alive, every call with an
    /// equal path returns the same handle.
    pub fn handle(&self, path: Path) -> Handle {
        self.inner.handle(path, None)
    }

    /// Returns the query handle for `path` bound to `binding`.
    ///
    /// Handles for the same path with a different binding, or without one,
    /// are distinct.
    pub fn query_handle(&self, path: Path, binding: QueryBinding) -> Handle {
        self.inner.handle(path, Some(binding))
    }

    /// Binds `query` at `path`, taking the extra flag from the query itself.
    pub fn query(&self, path: Path, query: Arc<dyn Query>) -> Handle {
        self.query_handle(path, QueryBinding::from_query(query))
    }

    /// Returns the number of live registry entries.
    pub fn registry_len(&self) -> usize {
        self.inner.registry.live_len()
    }

    /// Drops registry entries whose handles are gone; returns how many.
    pub fn prune(&self) -> usize {
        self.inner.registry.prune()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Returns the model the store addresses.
    pub fn model(&self) -> &Arc<dyn ModelBackend> {
        &self.inner.model
    }
}

impl fmt::Debug for SignalStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalStore")
            .field("config", &self.inner.config)
            .field("registry_len", &self.inner.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sigstore_backend::{path, MemoryModel, MemoryQueries, QueryDefinition, Segment};

    fn store() -> SignalStore {
        SignalStore::new(Arc::new(MemoryModel::new()))
    }

    #[test]
    fn same_path_same_handle() {
        let store = store();
        let a = store.handle(path!["users", "u1"]);
        let b = store.handle(path!["users", "u1"]);
        assert!(a.ptr_eq(&b));
        assert_eq!(a, b);
        assert_eq!(store.registry_len(), 1);
    }

    #[test]
    fn different_paths_different_handles() {
        let store = store();
        let a = store.handle(path!["users", "u1"]);
        let b = store.handle(path!["users", "u2"]);
        assert_ne!(a, b);
    }

    #[test]
    fn clones_share_the_registry() {
        let store = store();
        let other = store.clone();
        assert!(store.root().ptr_eq(&other.root()));
    }

    #[test]
    fn dropped_handles_are_reclaimed() {
        let store = store();
        let handle = store.handle(path!["a"]);
        drop(handle);
        assert_eq!(store.registry_len(), 0);
        assert_eq!(store.prune(), 1);
        assert_eq!(store.prune(), 0);
    }

    #[test]
    fn threshold_sweeps_dead_entries() {
        let store = SignalStore::with_config(Arc::new(MemoryModel::new()), StoreConfig::new().prune_threshold(4));
        for index in 0..64usize {
            drop(store.handle(path!["items", index]));
        }
        let kept = store.handle(path!["kept"]);
        assert!(store.inner.registry.len() <= 4);
        assert_eq!(store.registry_len(), 1);
        assert!(kept.ptr_eq(&store.handle(path!["kept"])));
    }

    #[test]
    fn query_binding_is_part_of_identity() {
        let model = Arc::new(MemoryModel::new());
        let queries = MemoryQueries::new(Arc::clone(&model));
        let store = SignalStore::new(model);
        let first = queries.query(QueryDefinition::docs("posts")).unwrap();
        let second = queries.query(QueryDefinition::docs("posts").count()).unwrap();

        let plain = store.handle(path!["posts"]);
        let bound = store.query(path!["posts"], first.clone());
        let again = store.query(path!["posts"], first);
        let other = store.query(path!["posts"], second);

        assert!(bound.ptr_eq(&again));
        assert_ne!(plain, bound);
        assert_ne!(bound, other);
        assert!(bound.is_query());
        assert!(!plain.is_query());
    }

    proptest! {
        #[test]
        fn identity_is_stable(keys in prop::collection::vec("[a-z]{1,6}", 0..6)) {
            let store = store();
            let path = Path::from_segments(keys.iter().map(|key| Segment::from(key.as_str())));
            let first = store.handle(path.clone());
            let second = store.handle(Path::from_segments(path.iter().cloned()));
            prop_assert!(first.ptr_eq(&second));
            prop_assert_eq!(first.path(), &path);
        }
    }
}
