// Path: crates/api/src/progress.rs
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress flags written by the sync engine and read by the scheduler.
#[derive(Debug, Default)]
pub struct SyncProgress {
    initial_recovery_done: AtomicBool,
}

impl SyncProgress {
    /// A fresh node that has not finished its first catch-up.
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the first sweep or bulk recovery has completed.
    pub fn is_initial_recovery_done(&self) -> bool {
        self.initial_recovery_done.load(Ordering::Acquire)
    }

    /// Marks the first catch-up as complete.
    pub fn mark_initial_recovery_done(&self) {
        self.initial_recovery_done.store(true, Ordering::Release);
    }
}
