//! Path navigation over a `serde_json::Value` tree.

use crate::error::{BackendError, BackendResult};
use crate::path::{Path, Segment};
use serde_json::{Map, Value};

/// Returns the value at `path`, if any.
///
/// Key segments address array elements when they parse as an index, and
/// index segments address object members by their decimal text.
pub(crate) fn lookup<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = step(current, segment)?;
    }
    Some(current)
}

fn step<'a>(value: &'a Value, segment: &Segment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Key(key)) => map.get(key),
        (Value::Object(map), Segment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), Segment::Index(index)) => items.get(*index),
        (Value::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// Returns a mutable reference to the value at `path`, creating missing
/// intermediate objects along the way. The final slot is created as `null`.
pub(crate) fn lookup_or_create<'a>(root: &'a mut Value, path: &Path) -> BackendResult<&'a mut Value> {
    let mut current = root;
    for (depth, segment) in path.iter().enumerate() {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = array_index(segment).ok_or_else(|| {
                    BackendError::type_mismatch(&prefix(path, depth), "object")
                })?;
                let len = items.len();
                if index == len {
                    items.push(Value::Null);
                }
                items
                    .get_mut(index)
                    .ok_or_else(|| BackendError::index_out_of_range(&prefix(path, depth), index, len))?
            }
            _ => return Err(BackendError::type_mismatch(&prefix(path, depth), "object or array")),
        };
    }
    Ok(current)
}

/// Removes the value at `path` and returns it.
///
/// Object members are removed preserving the order of the rest; array
/// elements are replaced by `null` so sibling indices stay stable.
pub(crate) fn remove(root: &mut Value, path: &Path) -> Option<Value> {
    let (parent_path, leaf) = match (path.parent(), path.leaf()) {
        (Some(parent), Some(leaf)) => (parent, leaf),
        _ => return Some(std::mem::replace(root, Value::Object(Map::new()))),
    };
    let parent = lookup_mut(root, &parent_path)?;
    match parent {
        Value::Object(map) => map.shift_remove(&leaf.to_string()),
        Value::Array(items) => {
            let index = array_index(leaf)?;
            items.get_mut(index).map(Value::take)
        }
        _ => None,
    }
}

/// Mutable variant of [`lookup`]; never creates anything.
pub(crate) fn lookup_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = root;
    for segment in path {
        current = match current {
            Value::Object(map) => map.get_mut(&segment.to_string())?,
            Value::Array(items) => items.get_mut(array_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn array_index(segment: &Segment) -> Option<usize> {
    match segment {
        Segment::Index(index) => Some(*index),
        Segment::Key(key) => key.parse().ok(),
    }
}

fn prefix(path: &Path, depth: usize) -> Path {
    Path::from_segments(path.segments()[..depth].iter().cloned())
}

/// Deep-merges `next` into `target`.
///
/// Objects are merged member by member and members absent from `next` are
/// removed; anything else is replaced. Returns true if `target` changed.
pub(crate) fn merge_deep(target: &mut Value, next: Value) -> bool {
    match (target, next) {
        (Value::Object(current), Value::Object(incoming)) => {
            let before = current.len();
            current.retain(|key, _| incoming.contains_key(key));
            let mut changed = current.len() != before;
            for (key, value) in incoming {
                match current.get_mut(&key) {
                    Some(existing) => changed |= merge_deep(existing, value),
                    None => {
                        current.insert(key, value);
                        changed = true;
                    }
                }
            }
            changed
        }
        (slot, value) => {
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        }
    }
}
