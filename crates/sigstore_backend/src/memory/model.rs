//! In-memory JSON document model.

use crate::backend::ModelBackend;
use crate::change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::error::{BackendError, BackendResult};
use crate::memory::tree;
use crate::path::Path;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::mpsc::Receiver;
use tracing::trace;
use uuid::Uuid;

/// Configuration for a [`MemoryModel`].
#[derive(Debug, Clone)]
pub struct MemoryModelConfig {
    /// Number of change events kept for polling.
    pub max_history: usize,
    /// Root key under which query results are materialised.
    pub query_root: String,
}

impl Default for MemoryModelConfig {
    fn default() -> Self {
        Self {
            max_history: 10_000,
            query_root: "$queries".to_string(),
        }
    }
}

impl MemoryModelConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the change feed history size.
    #[must_use]
    pub const fn max_history(mut self, value: usize) -> Self {
        self.max_history = value;
        self
    }

    /// Sets the root key for materialised query results.
    #[must_use]
    pub fn query_root(mut self, value: impl Into<String>) -> Self {
        self.query_root = value.into();
        self
    }
}

struct State {
    root: Value,
    sequence: u64,
}

/// A document model held entirely in memory.
///
/// The whole document is one `serde_json::Value` object. Mutations are
/// reached through [`ModelBackend::invoke`] with the method names of the
/// model API (`set`, `setDiffDeep`, `del`, `push`, ...). Every mutation
/// advances the sequence number and emits a [`ChangeEvent`].
///
/// # Example
///
/// ```rust
/// use sigstore_backend::{path, MemoryModel, ModelBackend};
/// use serde_json::json;
///
/// let model = MemoryModel::new();
/// model.invoke(&path!["counters", "visits"], "increment", &[json!(2)]).unwrap();
/// assert_eq!(model.read(&path!["counters", "visits"]).unwrap(), Some(json!(2)));
/// ```
pub struct MemoryModel {
    config: MemoryModelConfig,
    state: RwLock<State>,
    feed: ChangeFeed,
    is_open: RwLock<bool>,
}

impl MemoryModel {
    /// Creates an empty model.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryModelConfig::default())
    }

    /// Creates an empty model with custom configuration.
    #[must_use]
    pub fn with_config(config: MemoryModelConfig) -> Self {
        let feed = ChangeFeed::with_max_history(config.max_history);
        Self {
            config,
            state: RwLock::new(State {
                root: Value::Object(Map::new()),
                sequence: 0,
            }),
            feed,
            is_open: RwLock::new(true),
        }
    }

    /// Creates a model pre-populated with `root`.
    ///
    /// A non-object `root` is replaced by an empty object.
    #[must_use]
    pub fn with_data(root: Value) -> Self {
        let model = Self::new();
        if root.is_object() {
            model.state.write().root = root;
        }
        model
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MemoryModelConfig {
        &self.config
    }

    /// Returns the sequence number of the latest mutation.
    pub fn sequence(&self) -> u64 {
        self.state.read().sequence
    }

    /// Returns a copy of the whole document.
    pub fn snapshot(&self) -> Value {
        self.state.read().root.clone()
    }

    /// Subscribes to change events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Subscribes to change events that touch `scope`.
    pub fn subscribe_under(&self, scope: Path) -> Receiver<ChangeEvent> {
        self.feed.subscribe_under(scope)
    }

    /// Returns the change feed.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Closes the model; further calls fail with [`BackendError::Closed`].
    pub fn close(&self) {
        *self.is_open.write() = false;
    }

    /// Returns true until [`MemoryModel::close`] is called.
    pub fn is_open(&self) -> bool {
        *self.is_open.read()
    }

    fn ensure_open(&self) -> BackendResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(BackendError::Closed)
        }
    }

    /// Writes (or removes, for `None`) a value without method dispatch.
    ///
    /// Used by the query backend to materialise results.
    pub(crate) fn put(&self, path: &Path, value: Option<Value>) -> BackendResult<()> {
        self.mutate(path, |root| {
            let kind = match value {
                Some(value) => {
                    let slot = tree::lookup_or_create(root, path)?;
                    if *slot == value {
                        None
                    } else {
                        let kind = kind_for(slot);
                        *slot = value;
                        Some(kind)
                    }
                }
                None => tree::remove(root, path).map(|_| ChangeKind::Delete),
            };
            Ok((Value::Null, kind))
        })
        .map(|_| ())
    }

    /// Runs `op` under the write lock and emits a change event if it reports one.
    fn mutate<F>(&self, path: &Path, op: F) -> BackendResult<Value>
    where
        F: FnOnce(&mut Value) -> BackendResult<(Value, Option<ChangeKind>)>,
    {
        self.ensure_open()?;
        let (result, event) = {
            let mut state = self.state.write();
            let (result, kind) = op(&mut state.root)?;
            let event = kind.map(|kind| {
                state.sequence += 1;
                ChangeEvent::new(state.sequence, path.clone(), kind)
            });
            (result, event)
        };
        if let Some(event) = event {
            trace!(path = %event.path, sequence = event.sequence, kind = ?event.kind, "model changed");
            self.feed.emit(event);
        }
        Ok(result)
    }
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBackend for MemoryModel {
    fn read(&self, path: &Path) -> BackendResult<Option<Value>> {
        self.ensure_open()?;
        Ok(tree::lookup(&self.state.read().root, path).cloned())
    }

    fn invoke(&self, path: &Path, method: &str, args: &[Value]) -> BackendResult<Value> {
        trace!(path = %path, method, "model invoke");
        match method {
            "get" => Ok(self.read(path)?.unwrap_or(Value::Null)),
            "set" => {
                let value = arg(method, args, 0)?.clone();
                self.mutate(path, |root| {
                    let slot = tree::lookup_or_create(root, path)?;
                    let previous = std::mem::replace(slot, value);
                    let kind = kind_for(&previous);
                    Ok((previous, Some(kind)))
                })
            }
            "setNull" => {
                let value = arg(method, args, 0)?.clone();
                self.mutate(path, |root| {
                    let slot = tree::lookup_or_create(root, path)?;
                    if slot.is_null() {
                        *slot = value;
                        Ok((slot.clone(), Some(ChangeKind::Insert)))
                    } else {
                        Ok((slot.clone(), None))
                    }
                })
            }
            "setDiffDeep" => {
                let value = arg(method, args, 0)?.clone();
                self.mutate(path, |root| {
                    let slot = tree::lookup_or_create(root, path)?;
                    let was_null = slot.is_null();
                    let changed = tree::merge_deep(slot, value);
                    let kind = match (changed, was_null) {
                        (false, _) => None,
                        (true, true) => Some(ChangeKind::Insert),
                        (true, false) => Some(ChangeKind::Update),
                    };
                    Ok((Value::Null, kind))
                })
            }
            "setEach" => {
                let entries = match arg(method, args, 0)? {
                    Value::Object(entries) => entries.clone(),
                    _ => return Err(BackendError::invalid_arguments(method, "expected an object")),
                };
                self.mutate(path, |root| {
                    let slot = tree::lookup_or_create(root, path)?;
                    let kind = kind_for(slot);
                    if slot.is_null() {
                        *slot = Value::Object(Map::new());
                    }
                    let target = slot
                        .as_object_mut()
                        .ok_or_else(|| BackendError::type_mismatch(path, "object"))?;
                    for (key, value) in entries {
                        target.insert(key, value);
                    }
                    Ok((Value::Null, Some(kind)))
                })
            }
            "del" => self.mutate(path, |root| match tree::remove(root, path) {
                Some(previous) => Ok((previous, Some(ChangeKind::Delete))),
                None => Ok((Value::Null, None)),
            }),
            "increment" => {
                let by = match args.first() {
                    None => Value::from(1),
                    Some(by) if by.is_number() => by.clone(),
                    Some(_) => return Err(BackendError::invalid_arguments(method, "expected a number")),
                };
                self.mutate(path, |root| {
                    let slot = tree::lookup_or_create(root, path)?;
                    let kind = kind_for(slot);
                    let current = if slot.is_null() { Value::from(0) } else { slot.clone() };
                    let next = add_numbers(&current, &by)
                        .ok_or_else(|| BackendError::type_mismatch(path, "number"))?;
                    *slot = next.clone();
                    Ok((next, Some(kind)))
                })
            }
            "push" | "unshift" => {
                let value = arg(method, args, 0)?.clone();
                let front = method == "unshift";
                self.mutate(path, |root| {
                    let (items, kind) = array_slot(root, path)?;
                    if front {
                        items.insert(0, value);
                    } else {
                        items.push(value);
                    }
                    Ok((Value::from(items.len()), Some(kind)))
                })
            }
            "pop" | "shift" => {
                let front = method == "shift";
                self.mutate(path, |root| {
                    let items = match tree::lookup_mut(root, path) {
                        Some(Value::Array(items)) => items,
                        None | Some(Value::Null) => return Ok((Value::Null, None)),
                        Some(_) => return Err(BackendError::type_mismatch(path, "array")),
                    };
                    let removed = if front {
                        (!items.is_empty()).then(|| items.remove(0))
                    } else {
                        items.pop()
                    };
                    match removed {
                        Some(value) => Ok((value, Some(ChangeKind::Update))),
                        None => Ok((Value::Null, None)),
                    }
                })
            }
            "insert" => {
                let index = index_arg(method, args, 0)?;
                let values: Vec<Value> = args[1..].to_vec();
                self.mutate(path, |root| {
                    let (items, kind) = array_slot(root, path)?;
                    if index > items.len() {
                        return Err(BackendError::index_out_of_range(path, index, items.len()));
                    }
                    items.splice(index..index, values);
                    Ok((Value::from(items.len()), Some(kind)))
                })
            }
            "remove" => {
                let index = index_arg(method, args, 0)?;
                let how_many = match args.get(1) {
                    None => 1,
                    Some(_) => index_arg(method, args, 1)?,
                };
                self.mutate(path, |root| {
                    let items = match tree::lookup_mut(root, path) {
                        Some(Value::Array(items)) => items,
                        None => return Err(BackendError::not_found(path)),
                        Some(_) => return Err(BackendError::type_mismatch(path, "array")),
                    };
                    if index >= items.len() {
                        return Err(BackendError::index_out_of_range(path, index, items.len()));
                    }
                    let end = index.saturating_add(how_many).min(items.len());
                    let removed: Vec<Value> = items.drain(index..end).collect();
                    Ok((Value::Array(removed), Some(ChangeKind::Update)))
                })
            }
            "add" => {
                let mut doc = match arg(method, args, 0)? {
                    Value::Object(doc) => doc.clone(),
                    _ => return Err(BackendError::invalid_arguments(method, "expected an object")),
                };
                let id = match doc.get("id") {
                    Some(Value::String(id)) => id.clone(),
                    Some(_) => return Err(BackendError::invalid_arguments(method, "id must be a string")),
                    None => {
                        let id = Uuid::new_v4().to_string();
                        doc.insert("id".to_string(), Value::String(id.clone()));
                        id
                    }
                };
                let doc_path = path.child(id.as_str());
                self.mutate(&doc_path, |root| {
                    let slot = tree::lookup_or_create(root, &doc_path)?;
                    let kind = kind_for(slot);
                    *slot = Value::Object(doc);
                    Ok((Value::String(id), Some(kind)))
                })
            }
            other => Err(BackendError::unknown_method(other)),
        }
    }
}

fn arg<'a>(method: &str, args: &'a [Value], position: usize) -> BackendResult<&'a Value> {
    args.get(position).ok_or_else(|| {
        BackendError::invalid_arguments(method, format!("missing argument {position}"))
    })
}

fn index_arg(method: &str, args: &[Value], position: usize) -> BackendResult<usize> {
    arg(method, args, position)?
        .as_u64()
        .and_then(|index| usize::try_from(index).ok())
        .ok_or_else(|| {
            BackendError::invalid_arguments(method, format!("argument {position} must be an index"))
        })
}

fn kind_for(previous: &Value) -> ChangeKind {
    if previous.is_null() {
        ChangeKind::Insert
    } else {
        ChangeKind::Update
    }
}

fn array_slot<'a>(root: &'a mut Value, path: &Path) -> BackendResult<(&'a mut Vec<Value>, ChangeKind)> {
    let slot = tree::lookup_or_create(root, path)?;
    let kind = kind_for(slot);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok((items, kind)),
        _ => Err(BackendError::type_mismatch(path, "array")),
    }
}

fn add_numbers(a: &Value, b: &Value) -> Option<Value> {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => a.checked_add(b).map(Value::from),
        _ => {
            let sum = a.as_f64()? + b.as_f64()?;
            serde_json::Number::from_f64(sum).map(Value::Number)
        }
    }
}
