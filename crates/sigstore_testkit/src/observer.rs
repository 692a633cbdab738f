//! A read observer that records what was read.

use parking_lot::Mutex;
use sigstore_backend::Path;
use sigstore_core::{Handle, Key, ReadObserver};

/// Records every `(path, key)` read through the store it is installed on.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    reads: Mutex<Vec<(Path, Key)>>,
}

impl RecordingObserver {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the reads recorded so far, oldest first.
    pub fn reads(&self) -> Vec<(Path, Key)> {
        self.reads.lock().clone()
    }

    /// Returns the recorded reads and clears the log.
    pub fn take(&self) -> Vec<(Path, Key)> {
        std::mem::take(&mut *self.reads.lock())
    }

    /// Returns the number of recorded reads.
    pub fn len(&self) -> usize {
        self.reads.lock().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.reads.lock().is_empty()
    }
}

impl ReadObserver for RecordingObserver {
    fn on_read(&self, target: &Handle, key: &Key) {
        self.reads.lock().push((target.path().clone(), key.clone()));
    }
}
