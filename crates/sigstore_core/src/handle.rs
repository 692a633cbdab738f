//! Handles: path-addressed stand-ins for locations in the model.

use crate::error::{SignalError, SignalResult};
use crate::key::{Key, Symbol};
use crate::query::QueryBinding;
use crate::store::StoreInner;
use crate::traps::{Access, Call, Called, Interceptor, Traps};
use parking_lot::RwLock;
use serde_json::Value;
use sigstore_backend::Path;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub(crate) struct HandleInner {
    store: Arc<StoreInner>,
    path: Path,
    query: Option<QueryBinding>,
    slots: RwLock<Vec<(Symbol, Value)>>,
}

impl HandleInner {
    pub(crate) fn new(store: Arc<StoreInner>, path: Path, query: Option<QueryBinding>) -> Self {
        Self {
            store,
            path,
            query,
            slots: RwLock::new(Vec::new()),
        }
    }
}

/// A path-addressed stand-in for a location in the model.
///
/// A handle holds no data. Reading a key yields another handle one segment
/// deeper; calling a handle invokes the model method named by its last
/// segment on its parent path. Direct assignment and deletion are refused.
///
/// Clones are the same handle: equality and hashing are by identity, and the
/// store hands out the same handle for the same path while any clone lives.
#[derive(Clone)]
pub struct Handle(Arc<HandleInner>);

impl Handle {
    pub(crate) fn from_inner(inner: Arc<HandleInner>) -> Self {
        Self(inner)
    }

    pub(crate) fn store(&self) -> &Arc<StoreInner> {
        &self.0.store
    }

    /// Returns the path this handle addresses.
    pub fn path(&self) -> &Path {
        &self.0.path
    }

    /// Returns the query binding of a root-of-query handle.
    pub fn query_binding(&self) -> Option<&QueryBinding> {
        self.0.query.as_ref()
    }

    /// Returns true if a query is bound to this handle.
    pub fn is_query(&self) -> bool {
        self.0.query.is_some()
    }

    /// Returns true if an extra query is bound to this handle.
    pub fn is_extra_query(&self) -> bool {
        self.0.query.as_ref().is_some_and(QueryBinding::is_extra)
    }

    /// Returns the handle of the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        self.0.path.parent().map(|path| self.0.store.handle(path, None))
    }

    /// Returns true if both handles are the same handle.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Reads `key` through the read trap.
    ///
    /// # Errors
    ///
    /// Fails only when reading the `map` sugar of a query whose backend
    /// cannot be read.
    pub fn at(&self, key: impl Into<Key>) -> SignalResult<Access> {
        Interceptor.read(self, &key.into())
    }

    /// Reads `key` and expects a handle.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::NotAHandle`] if the read yields a query
    /// method, the `map` sugar or a slot value.
    pub fn child(&self, key: impl Into<Key>) -> SignalResult<Self> {
        let key = key.into();
        Interceptor
            .read(self, &key)?
            .into_handle()
            .ok_or_else(|| SignalError::not_a_handle(&key))
    }

    /// Reads `keys` one after another, like a chained property access.
    ///
    /// # Errors
    ///
    /// Fails as [`Handle::child`] does at the first key that does not yield
    /// a handle.
    pub fn dig<I>(&self, keys: I) -> SignalResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        keys.into_iter().try_fold(self.clone(), |handle, key| handle.child(key))
    }

    /// Assigns `value` to `key` through the write trap.
    ///
    /// Only internal symbol keys are writable.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::MutationNotAllowed`] for anything else.
    pub fn write(&self, key: impl Into<Key>, value: Value) -> SignalResult<()> {
        Interceptor.write(self, &key.into(), value)
    }

    /// Deletes `key` through the delete trap.
    ///
    /// # Errors
    ///
    /// Always returns [`SignalError::MutationNotAllowed`].
    pub fn delete(&self, key: impl Into<Key>) -> SignalResult<()> {
        Interceptor.delete(self, &key.into())
    }

    /// Returns true if `key` is a symbol with a slot on this handle.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        Interceptor.has(self, &key.into())
    }

    /// Returns the symbols stored on this handle, in insertion order.
    pub fn keys(&self) -> Vec<Symbol> {
        Interceptor.enumerate(self)
    }

    /// Calls this handle through the call trap.
    ///
    /// # Errors
    ///
    /// See [`Traps::call`].
    pub fn call<R>(&self, call: Call<'_, R>) -> SignalResult<Called<R>> {
        Interceptor.call(self, call)
    }

    /// Calls this handle as a model method with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidCall`] when the handle does not name a
    /// method, or the model's error unchanged.
    pub fn invoke(&self, args: Vec<Value>) -> SignalResult<Value> {
        match self.call(Call::<()>::Method(args))? {
            Called::Value(value) => Ok(value),
            Called::Mapped(_) => Err(SignalError::invalid_call("method call produced a mapping")),
        }
    }

    /// Calls this handle as the `map` sugar over its parent array.
    ///
    /// On a query handle this maps over the query's ids (or its extra
    /// payload), as reading `map` on it would.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidCall`] when the handle is not a `map`
    /// leaf or its parent holds something other than an array.
    pub fn map<R, F>(&self, mut f: F) -> SignalResult<Vec<R>>
    where
        F: FnMut(&Self, usize) -> R,
    {
        if self.is_query() {
            return match self.at("map")? {
                Access::Map(map) => Ok(map.map(f)),
                _ => Err(SignalError::invalid_call(format!("map is not available at {}", self.path()))),
            };
        }
        let mapper: &mut dyn FnMut(&Self, usize) -> R = &mut f;
        match self.call(Call::Map(mapper))? {
            Called::Mapped(items) => Ok(items),
            Called::Value(_) => Err(SignalError::invalid_call("map call produced a value")),
        }
    }

    /// Reads `name` and calls the result, like `handle.name(args)`.
    ///
    /// On a query handle a query method name runs the bound query method.
    /// Query methods take no arguments.
    ///
    /// # Errors
    ///
    /// Propagates read and call failures; returns
    /// [`SignalError::InvalidCall`] if `name` reads as something that cannot
    /// be called with arguments.
    pub fn invoke_method(&self, name: &str, args: Vec<Value>) -> SignalResult<Value> {
        match self.at(name)? {
            Access::Handle(handle) => handle.invoke(args),
            Access::QueryMethod(_) if !args.is_empty() => Err(SignalError::invalid_call(format!(
                "query method {name} takes no arguments, got {}",
                args.len()
            ))),
            Access::QueryMethod(method) => method.invoke(),
            Access::Map(_) | Access::Slot(_) => Err(SignalError::invalid_call(format!("{name} is not a method"))),
        }
    }

    /// Returns the current model value at this handle's path.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub fn value(&self) -> SignalResult<Option<Value>> {
        Ok(self.0.store.model.read(&self.0.path)?)
    }

    pub(crate) fn slot(&self, symbol: &Symbol) -> Option<Value> {
        self.0
            .slots
            .read()
            .iter()
            .find(|(key, _)| key == symbol)
            .map(|(_, value)| value.clone())
    }

    pub(crate) fn set_slot(&self, symbol: Symbol, value: Value) {
        let mut slots = self.0.slots.write();
        match slots.iter_mut().find(|(key, _)| *key == symbol) {
            Some((_, slot)) => *slot = value,
            None => slots.push((symbol, value)),
        }
    }

    pub(crate) fn slot_keys(&self) -> Vec<Symbol> {
        self.0.slots.read().iter().map(|(key, _)| key.clone()).collect()
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Handle {}

impl Hash for Handle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("path", &self.0.path)
            .field("query", &self.0.query)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Mutation;
    use crate::{Access, Key, SignalError, SignalStore, Symbol};
    use serde_json::json;
    use sigstore_backend::{path, MemoryModel, ModelBackend};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn store_with(data: serde_json::Value) -> (Arc<MemoryModel>, SignalStore) {
        let model = Arc::new(MemoryModel::with_data(data));
        let store = SignalStore::new(model.clone());
        (model, store)
    }

    #[test]
    fn chained_access_builds_paths() {
        let (_, store) = store_with(json!({}));
        let handle = store.root().dig(["users", "u1", "name"]).unwrap();
        assert_eq!(handle.path(), &path!["users", "u1", "name"]);
        assert_eq!(handle.parent().unwrap().path(), &path!["users", "u1"]);
        assert!(store.root().parent().is_none());
    }

    #[test]
    fn index_keys_stay_indices() {
        let (_, store) = store_with(json!({}));
        let handle = store.root().child("list").unwrap().child(0usize).unwrap();
        assert_eq!(handle.path(), &path!["list", 0usize]);
        let named = store.root().dig(["list", "0"]).unwrap();
        assert_ne!(handle, named);
    }

    #[test]
    fn handles_hash_by_identity() {
        let (_, store) = store_with(json!({}));
        let mut set = HashSet::new();
        set.insert(store.root().child("a").unwrap());
        set.insert(store.root().child("a").unwrap());
        set.insert(store.root().child("b").unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn write_and_delete_are_refused() {
        let (model, store) = store_with(json!({"users": {"u1": {"name": "Ann"}}}));
        let user = store.root().dig(["users", "u1"]).unwrap();

        let err = user.write("name", json!("Bob")).unwrap_err();
        assert!(matches!(
            err,
            SignalError::MutationNotAllowed {
                operation: Mutation::Write,
                ..
            }
        ));
        let err = user.delete("name").unwrap_err();
        assert!(matches!(
            err,
            SignalError::MutationNotAllowed {
                operation: Mutation::Delete,
                ..
            }
        ));
        assert_eq!(model.read(&path!["users", "u1", "name"]).unwrap(), Some(json!("Ann")));
    }

    #[test]
    fn internal_symbols_use_slots() {
        let (_, store) = store_with(json!({}));
        let handle = store.root().child("a").unwrap();
        let state = Symbol::internal("state");

        assert!(!handle.has(&state));
        handle.write(&state, json!(1)).unwrap();
        handle.write(&state, json!(2)).unwrap();
        assert!(handle.has(&state));
        assert_eq!(handle.keys(), vec![state.clone()]);
        assert!(matches!(handle.at(&state).unwrap(), Access::Slot(Some(value)) if value == json!(2)));

        // slots are per handle, not per path value
        let same = store.root().child("a").unwrap();
        assert!(same.has(&state));
    }

    #[test]
    fn ordinary_symbols_are_not_writable() {
        let (_, store) = store_with(json!({}));
        let handle = store.root();
        let err = handle.write(Symbol::new("tag"), json!(true)).unwrap_err();
        assert!(err.is_mutation_not_allowed());
        assert!(!handle.has(Symbol::new("tag")));
        assert!(!handle.has("tag"));
    }

    #[test]
    fn child_of_slot_is_not_a_handle() {
        let (_, store) = store_with(json!({}));
        let err = store.root().child(Key::from(Symbol::internal("s"))).unwrap_err();
        assert!(matches!(err, SignalError::NotAHandle { .. }));
    }

    #[test]
    fn invoke_method_reaches_model() {
        let (model, store) = store_with(json!({"counters": {}}));
        let hits = store.root().dig(["counters", "hits"]).unwrap();
        assert_eq!(hits.invoke_method("increment", vec![json!(5)]).unwrap(), json!(5));
        assert_eq!(hits.invoke_method("$increment", vec![]).unwrap(), json!(6));
        assert_eq!(model.read(&path!["counters", "hits"]).unwrap(), Some(json!(6)));
        assert_eq!(hits.value().unwrap(), Some(json!(6)));
    }
}
