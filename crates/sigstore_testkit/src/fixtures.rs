//! Store fixtures.
//!
//! Provides convenience functions for setting up stores over an in-memory
//! model and common test scenarios.

use serde_json::{json, Value};
use sigstore_backend::{MemoryModel, MemoryQueries, MemoryQuery, QueryDefinition};
use sigstore_core::{SignalStore, StoreConfig};
use std::sync::Arc;

/// A store over an in-memory model, with a query backend on the same model.
pub struct TestStore {
    /// The store under test.
    pub store: SignalStore,
    /// The model the store addresses.
    pub model: Arc<MemoryModel>,
    /// Queries over `model`.
    pub queries: MemoryQueries,
}

impl TestStore {
    /// Creates a store over an empty model.
    pub fn empty() -> Self {
        Self::with_data(json!({}))
    }

    /// Creates a store over [`blog_data`].
    pub fn seeded() -> Self {
        Self::with_data(blog_data())
    }

    /// Creates a store over `data`.
    pub fn with_data(data: Value) -> Self {
        Self::with_config(data, StoreConfig::default())
    }

    /// Creates a store over `data` with a custom configuration.
    pub fn with_config(data: Value, config: StoreConfig) -> Self {
        let model = Arc::new(MemoryModel::with_data(data));
        let queries = MemoryQueries::new(Arc::clone(&model));
        let store = SignalStore::with_config(model.clone(), config);
        Self { store, model, queries }
    }

    /// Returns the query for `definition`.
    pub fn query(&self, definition: QueryDefinition) -> Arc<MemoryQuery> {
        self.queries.query(definition).expect("Failed to create query")
    }
}

impl std::ops::Deref for TestStore {
    type Target = SignalStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test against a store over [`blog_data`].
///
/// # Example
///
/// ```rust
/// use sigstore_testkit::with_store;
///
/// with_store(|store| {
///     let title = store.root().dig(["posts", "a", "title"]).unwrap();
///     assert_eq!(title.value().unwrap(), Some(serde_json::json!("Hello")));
/// });
/// ```
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::seeded();
    f(&store)
}

/// Runs a test against a store over an empty model.
pub fn with_empty_store<F, R>(f: F) -> R
where
    F: FnOnce(&TestStore) -> R,
{
    let store = TestStore::empty();
    f(&store)
}

/// A small blog: session and page state, users, posts and a tag list.
///
/// Posts `a` and `b` are tagged `news`, `c` is tagged `howto`.
pub fn blog_data() -> Value {
    json!({
        "_session": {"userId": "u1", "visible": false},
        "_page": {"title": "Home"},
        "users": {
            "u1": {"name": "Ann", "role": "admin"},
            "u2": {"name": "Bob", "role": "editor"}
        },
        "posts": {
            "a": {"title": "Hello", "author": "u1", "tag": "news", "draft": false},
            "b": {"title": "Second", "author": "u2", "tag": "news", "draft": true},
            "c": {"title": "How to", "author": "u1", "tag": "howto", "draft": false}
        },
        "tags": ["news", "howto"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigstore_backend::{path, ModelBackend};

    #[test]
    fn seeded_store_reads_data() {
        with_store(|store| {
            let name = store.root().dig(["users", "u2", "name"]).unwrap();
            assert_eq!(name.value().unwrap(), Some(json!("Bob")));
            assert_eq!(store.model.read(&path!["_page", "title"]).unwrap(), Some(json!("Home")));
        });
    }

    #[test]
    fn empty_store_has_nothing() {
        with_empty_store(|store| {
            assert_eq!(store.root().value().unwrap(), Some(json!({})));
            assert!(store.queries.is_empty());
        });
    }
}
