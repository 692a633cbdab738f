//! Path registry.
//!
//! Maps `(path, query binding)` to the one live handle for it, so that the
//! same path always yields the same handle instance while anybody holds it.

use crate::handle::{Handle, HandleInner};
use crate::query::QueryBinding;
use crate::store::StoreInner;
use parking_lot::RwLock;
use sigstore_backend::Path;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Identity of a query binding inside the registry.
///
/// The query pointer is only compared, never dereferenced. A handle keeps
/// its query alive, so a live entry's pointer cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BindingKey {
    query: usize,
    is_extra: bool,
}

impl BindingKey {
    pub(crate) fn of(binding: &QueryBinding) -> Self {
        Self {
            query: Arc::as_ptr(binding.query()) as *const () as usize,
            is_extra: binding.is_extra(),
        }
    }
}

type EntryKey = (Path, Option<BindingKey>);

struct Entries {
    map: HashMap<EntryKey, Weak<HandleInner>>,
    next_prune: usize,
}

/// Memoisation table from path to handle.
///
/// Entries are weak: once every clone of a handle is dropped its entry is
/// dead and the next lookup creates a fresh handle.
pub(crate) struct Registry {
    entries: RwLock<Entries>,
    prune_threshold: usize,
}

impl Registry {
    pub(crate) fn new(prune_threshold: usize) -> Self {
        Self {
            entries: RwLock::new(Entries {
                map: HashMap::new(),
                next_prune: prune_threshold.max(1),
            }),
            prune_threshold: prune_threshold.max(1),
        }
    }

    /// Returns the live handle for `path`/`binding`, creating it if needed.
    pub(crate) fn handle(
        &self,
        store: &Arc<StoreInner>,
        path: Path,
        binding: Option<QueryBinding>,
    ) -> Handle {
        let key: EntryKey = (path, binding.as_ref().map(BindingKey::of));
        if let Some(inner) = self.entries.read().map.get(&key).and_then(Weak::upgrade) {
            return Handle::from_inner(inner);
        }

        let mut entries = self.entries.write();
        // Another caller may have created it between the two locks
        if let Some(inner) = entries.map.get(&key).and_then(Weak::upgrade) {
            return Handle::from_inner(inner);
        }

        let inner = Arc::new(HandleInner::new(Arc::clone(store), key.0.clone(), binding));
        trace!(path = %key.0, query = key.1.is_some(), "handle created");
        entries.map.insert(key, Arc::downgrade(&inner));

        if entries.map.len() >= entries.next_prune {
            let removed = sweep(&mut entries.map);
            entries.next_prune = (entries.map.len() * 2).max(self.prune_threshold);
            debug!(removed, live = entries.map.len(), "registry pruned");
        }

        Handle::from_inner(inner)
    }

    /// Removes dead entries and returns how many were removed.
    pub(crate) fn prune(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = sweep(&mut entries.map);
        if removed > 0 {
            debug!(removed, live = entries.map.len(), "registry pruned");
        }
        removed
    }

    /// Returns the number of entries whose handle is still alive.
    pub(crate) fn live_len(&self) -> usize {
        self.entries
            .read()
            .map
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Returns the number of entries, dead or alive.
    pub(crate) fn len(&self) -> usize {
        self.entries.read().map.len()
    }
}

fn sweep(map: &mut HashMap<EntryKey, Weak<HandleInner>>) -> usize {
    let before = map.len();
    map.retain(|_, entry| entry.strong_count() > 0);
    before - map.len()
}
