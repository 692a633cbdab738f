//! Read observation hook.

use crate::handle::Handle;
use crate::key::Key;

/// Receives a notification after every successful read through a handle.
///
/// A reactive runtime installs one to learn which locations a computation
/// depends on. Observers must not block and must not read through handles
/// of the same store while being notified.
pub trait ReadObserver: Send + Sync {
    /// Called after `key` was read on `target`.
    fn on_read(&self, target: &Handle, key: &Key);
}

impl<F> ReadObserver for F
where
    F: Fn(&Handle, &Key) + Send + Sync,
{
    fn on_read(&self, target: &Handle, key: &Key) {
        self(target, key);
    }
}
