// Path: crates/scheduler/src/deferred.rs
use fleet_types::app::DeferredCheck;
use fleet_types::TimestampMs;
use std::collections::VecDeque;

/// Candidates skipped on purpose, to be retried once `not_before` passes.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    entries: VecDeque<DeferredCheck>,
}

impl DeferredQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `check`, replacing any earlier entry for the same app.
    pub fn push(&mut self, check: DeferredCheck) {
        self.entries.retain(|c| c.app_name != check.app_name);
        self.entries.push_back(check);
    }

    /// Removes and returns the earliest due entry.
    pub fn pop_due(&mut self, now: TimestampMs) -> Option<DeferredCheck> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, c)| c.not_before <= now)
            .min_by_key(|(_, c)| c.not_before)
            .map(|(i, _)| i)?;
        self.entries.remove(index)
    }

    /// True if `name` is queued.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|c| c.app_name == name)
    }

    /// Number of queued entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
