//! Completed-chunk progress tracking for the orchestrators.

use std::sync::{Arc, Mutex};

/// Callback invoked as `(completed, total)` after each finished chunk.
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Mutex-guarded completed-chunk counter shared by parallel transfers.
pub(crate) struct Progress {
    completed: Mutex<usize>,
    total: usize,
    callback: Option<ProgressFn>,
}

impl Progress {
    pub(crate) fn new(total: usize, callback: Option<ProgressFn>) -> Self {
        Self {
            completed: Mutex::new(0),
            total,
            callback,
        }
    }

    /// Record one finished chunk and notify the callback.
    pub(crate) fn tick(&self) {
        let mut completed = self.completed.lock().expect("progress lock poisoned");
        *completed += 1;
        if let Some(callback) = &self.callback {
            callback(*completed, self.total);
        }
    }
}
