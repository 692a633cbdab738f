//! Change notifications for model mutations.
//!
//! Every successful mutation of a [`crate::MemoryModel`] produces one
//! [`ChangeEvent`]. Consumers either hold a channel receiver, optionally
//! narrowed to a subtree, or poll the bounded history with a cursor.
//!
//! # Usage
//!
//! ```rust
//! use sigstore_backend::{path, MemoryModel, ModelBackend};
//! use serde_json::json;
//!
//! let model = MemoryModel::new();
//! let receiver = model.subscribe();
//!
//! model.invoke(&path!["users", "u1", "name"], "set", &[json!("Ada")]).unwrap();
//!
//! let event = receiver.recv().unwrap();
//! assert_eq!(event.path, path!["users", "u1", "name"]);
//! ```

use crate::path::Path;
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Weak;

/// What a mutation did to the value at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A value was written where none existed.
    Insert,
    /// An existing value was replaced or modified in place.
    Update,
    /// A value was removed.
    Delete,
}

/// One model mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Sequence number of the mutation (strictly increasing).
    pub sequence: u64,
    /// The path the mutating method was invoked on.
    pub path: Path,
    /// What happened at `path`.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Creates a change event.
    pub fn new(sequence: u64, path: Path, kind: ChangeKind) -> Self {
        Self {
            sequence,
            path,
            kind,
        }
    }

    /// Returns true if the mutation may have changed the value at `path`.
    ///
    /// That is the case when the event path is `path`, one of its ancestors
    /// (the subtree was replaced) or one of its descendants.
    pub fn touches(&self, path: &Path) -> bool {
        self.path.is_prefix_of(path) || path.is_prefix_of(&self.path)
    }
}

/// Synchronous observer of a [`ChangeFeed`].
///
/// Watchers run on the emitting thread, after channel subscribers were
/// served and with no model lock held, so they may read or write the model.
/// A write made from a watcher is emitted as a nested event.
pub trait ChangeWatcher: Send + Sync {
    /// Called once per emitted event.
    fn on_change(&self, event: &ChangeEvent);
}

struct Subscriber {
    scope: Path,
    sender: Sender<ChangeEvent>,
}

/// Fan-out of model mutations.
///
/// Events arrive in sequence order. A subscriber scoped to a path only
/// receives events that [touch](ChangeEvent::touches) it. Subscribers whose
/// receiver was dropped are forgotten on the next emit. The most recent
/// events are also kept for cursor-based polling.
pub struct ChangeFeed {
    subscribers: Mutex<Vec<Subscriber>>,
    watchers: Mutex<Vec<Weak<dyn ChangeWatcher>>>,
    history: RwLock<VecDeque<ChangeEvent>>,
    capacity: usize,
}

impl ChangeFeed {
    /// Creates a feed keeping the last 10 000 events.
    pub fn new() -> Self {
        Self::with_max_history(10_000)
    }

    /// Creates a feed keeping the last `capacity` events.
    pub fn with_max_history(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
            history: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    /// Returns a receiver for every future event.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.subscribe_under(Path::root())
    }

    /// Returns a receiver for future events touching `scope`.
    pub fn subscribe_under(&self, scope: Path) -> Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.lock().push(Subscriber { scope, sender });
        receiver
    }

    /// Registers `watcher` until it is dropped.
    pub fn watch(&self, watcher: Weak<dyn ChangeWatcher>) {
        self.watchers.lock().push(watcher);
    }

    /// Records `event` and delivers it.
    pub fn emit(&self, event: ChangeEvent) {
        {
            let mut history = self.history.write();
            if self.capacity > 0 {
                if history.len() == self.capacity {
                    history.pop_front();
                }
                history.push_back(event.clone());
            }
        }

        self.subscribers.lock().retain(|subscriber| {
            !event.touches(&subscriber.scope) || subscriber.sender.send(event.clone()).is_ok()
        });

        let watchers: Vec<_> = {
            let mut watchers = self.watchers.lock();
            watchers.retain(|watcher| watcher.strong_count() > 0);
            watchers.iter().filter_map(Weak::upgrade).collect()
        };
        for watcher in watchers {
            watcher.on_change(&event);
        }
    }

    /// Returns up to `limit` recorded events newer than `cursor`.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.poll_under(&Path::root(), cursor, limit)
    }

    /// Returns up to `limit` recorded events newer than `cursor` touching `scope`.
    pub fn poll_under(&self, scope: &Path, cursor: u64, limit: usize) -> Vec<ChangeEvent> {
        self.history
            .read()
            .iter()
            .filter(|event| event.sequence > cursor && event.touches(scope))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the sequence of the newest recorded event, or 0.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().back().map_or(0, |event| event.sequence)
    }

    /// Returns the number of subscribers, including ones not yet found dead.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns the number of live watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().iter().filter(|watcher| watcher.strong_count() > 0).count()
    }

    /// Returns the number of recorded events.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
