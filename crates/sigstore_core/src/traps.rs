//! Interception layer.
//!
//! Every operation on a [`Handle`] is routed through one of the six traps
//! below. The read trap does the addressing; the call trap turns a handle
//! into a model method invocation; the write and delete traps refuse direct
//! mutation of model data.

use crate::error::{SignalError, SignalResult};
use crate::handle::Handle;
use crate::key::{Key, Symbol};
use crate::query::{BoundQueryMethod, QueryMap, QueryMethod};
use crate::resolve::{resolve_key, ResolvedKey};
use serde_json::Value;
use sigstore_backend::Segment;
use std::fmt;
use tracing::{trace, warn};

/// Outcome of the read trap.
#[derive(Debug, Clone)]
pub enum Access {
    /// A handle one segment deeper (or at a query's ids/extra location).
    Handle(Handle),
    /// A query method bound to the handle's query.
    QueryMethod(BoundQueryMethod),
    /// The `map` sugar of a query handle.
    Map(QueryMap),
    /// The value stored under a symbol key, if any.
    Slot(Option<Value>),
}

impl Access {
    /// Returns the handle, if the read produced one.
    pub fn into_handle(self) -> Option<Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }

    /// Borrows the handle, if the read produced one.
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Self::Handle(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Arguments of the call trap.
pub enum Call<'f, R> {
    /// A model method call with positional arguments.
    Method(Vec<Value>),
    /// The `map` sugar: `f` receives each element handle and its index.
    Map(&'f mut dyn FnMut(&Handle, usize) -> R),
}

impl<R> fmt::Debug for Call<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(args) => f.debug_tuple("Method").field(args).finish(),
            Self::Map(_) => f.write_str("Map(..)"),
        }
    }
}

/// Outcome of the call trap.
#[derive(Debug, Clone, PartialEq)]
pub enum Called<R> {
    /// What the model method returned.
    Value(Value),
    /// One result per mapped element.
    Mapped(Vec<R>),
}

/// The operations a handle intercepts.
pub trait Traps {
    /// Property read.
    ///
    /// # Errors
    ///
    /// Fails only when materialising the `map` sugar of a query fails.
    fn read(&self, target: &Handle, key: &Key) -> SignalResult<Access>;

    /// Property assignment.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::MutationNotAllowed`] unless `key` is an
    /// internal symbol.
    fn write(&self, target: &Handle, key: &Key, value: Value) -> SignalResult<()>;

    /// Property deletion.
    ///
    /// # Errors
    ///
    /// Always returns [`SignalError::MutationNotAllowed`].
    fn delete(&self, target: &Handle, key: &Key) -> SignalResult<()>;

    /// Membership test; only symbol slots are members.
    fn has(&self, target: &Handle, key: &Key) -> bool;

    /// Own keys: the handle's slot symbols.
    fn enumerate(&self, target: &Handle) -> Vec<Symbol>;

    /// Function call.
    ///
    /// # Errors
    ///
    /// Returns [`SignalError::InvalidCall`] when the handle is the root, its
    /// last segment is an index, or the call shape does not fit the leaf;
    /// otherwise the model's error unchanged.
    fn call<R>(&self, target: &Handle, call: Call<'_, R>) -> SignalResult<Called<R>>;
}

/// The trap implementation used by every [`Handle`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Interceptor;

impl Interceptor {
    fn read_uncounted(target: &Handle, key: &Key) -> SignalResult<Access> {
        let store = target.store();

        if let Some(binding) = target.query_binding() {
            if let Some(name) = key.as_name() {
                if let Some(method) = QueryMethod::parse(name) {
                    return Ok(Access::QueryMethod(binding.bind(method)));
                }
                if name == "map" {
                    return Ok(Access::Map(QueryMap::capture(store, binding, target.path())?));
                }
            }
        }

        let segment = match resolve_key(target.path(), key, &store.config) {
            ResolvedKey::Symbol(symbol) => return Ok(Access::Slot(target.slot(&symbol))),
            ResolvedKey::Segment(segment) => segment,
        };
        let path = match target.query_binding() {
            Some(binding) => binding.child_path(target.path(), segment),
            None => target.path().child(segment),
        };
        Ok(Access::Handle(store.handle(path, None)))
    }
}

impl Traps for Interceptor {
    fn read(&self, target: &Handle, key: &Key) -> SignalResult<Access> {
        let access = Self::read_uncounted(target, key)?;
        if let Some(observer) = target.store().observer() {
            observer.on_read(target, key);
        }
        Ok(access)
    }

    fn write(&self, target: &Handle, key: &Key, value: Value) -> SignalResult<()> {
        match key {
            Key::Symbol(symbol) if symbol.is_internal() => {
                target.set_slot(symbol.clone(), value);
                Ok(())
            }
            _ => {
                warn!(path = %target.path(), key = %key, "direct write refused");
                Err(SignalError::write_not_allowed())
            }
        }
    }

    fn delete(&self, target: &Handle, key: &Key) -> SignalResult<()> {
        warn!(path = %target.path(), key = %key, "direct delete refused");
        Err(SignalError::delete_not_allowed())
    }

    fn has(&self, target: &Handle, key: &Key) -> bool {
        match key {
            Key::Symbol(symbol) => target.slot(symbol).is_some(),
            _ => false,
        }
    }

    fn enumerate(&self, target: &Handle) -> Vec<Symbol> {
        target.slot_keys()
    }

    fn call<R>(&self, target: &Handle, call: Call<'_, R>) -> SignalResult<Called<R>> {
        let path = target.path();
        let (parent, leaf) = match (path.parent(), path.leaf()) {
            (Some(parent), Some(Segment::Key(leaf))) => (parent, leaf.as_str()),
            (Some(_), Some(Segment::Index(index))) => {
                return Err(SignalError::invalid_call(format!(
                    "array element {index} at {path} is not a method"
                )));
            }
            _ => return Err(SignalError::invalid_call("the root handle cannot be called")),
        };
        let store = target.store();

        match (leaf, call) {
            ("map", Call::Map(f)) => {
                let len = match store.model.read(&parent)? {
                    None => 0,
                    Some(value) if is_falsy(&value) => 0,
                    Some(Value::Array(items)) => items.len(),
                    Some(_) => {
                        return Err(SignalError::invalid_call(format!("map over non-array value at {parent}")));
                    }
                };
                trace!(path = %parent, len, "map");
                let mapped = (0..len)
                    .map(|index| {
                        let element = store.handle(parent.child(index), None);
                        f(&element, index)
                    })
                    .collect();
                Ok(Called::Mapped(mapped))
            }
            ("map", Call::Method(_)) => Err(SignalError::invalid_call(format!(
                "map at {parent} expects a function"
            ))),
            (method, Call::Map(_)) => Err(SignalError::invalid_call(format!(
                "{method} at {parent} is not map"
            ))),
            (method, Call::Method(args)) => {
                trace!(path = %parent, method, args = args.len(), "invoke");
                Ok(Called::Value(store.model.invoke(&parent, method, &args)?))
            }
        }
    }
}

/// `null`, `false`, zero and the empty string map like an empty array.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}
