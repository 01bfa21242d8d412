// Path: crates/api/src/clock.rs
use fleet_types::TimestampMs;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// A source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_ms(&self) -> TimestampMs;
}

/// Wall-clock time anchored once at construction and advanced with tokio's
/// monotonic clock, so that timestamps follow `tokio::time::advance` in
/// paused tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    base_ms: TimestampMs,
    started: Instant,
}

impl TokioClock {
    /// Anchors the clock at the current system time.
    pub fn new() -> Self {
        let base_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self::starting_at(base_ms)
    }

    /// Anchors the clock at a fixed time.
    pub fn starting_at(base_ms: TimestampMs) -> Self {
        Self {
            base_ms,
            started: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> TimestampMs {
        self.base_ms + self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_paused_time() {
        let clock = TokioClock::starting_at(1_000);
        assert_eq!(clock.now_ms(), 1_000);
        tokio::time::advance(Duration::from_secs(90)).await;
        assert_eq!(clock.now_ms(), 91_000);
    }
}
