// Path: crates/telemetry/src/sinks.rs
//! Defines abstract traits for metrics reporting, decoupling core logic from the backend.

use once_cell::sync::OnceCell;

// --- Static Sink Access ---

/// A no-op sink for use in tests or when telemetry is disabled.
#[derive(Debug, Clone, Copy)]
pub struct NopSink;

/// A lazily-initialized static reference to the global `MetricsSink` implementation.
pub static SINK: OnceCell<&'static dyn MetricsSink> = OnceCell::new();
static NOP_SINK: NopSink = NopSink;

/// Returns the configured error metrics sink, or a no-op sink.
pub fn error_metrics() -> &'static dyn ErrorMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured sync metrics sink, or a no-op sink.
pub fn sync_metrics() -> &'static dyn SyncMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured registry metrics sink, or a no-op sink.
pub fn registry_metrics() -> &'static dyn RegistryMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

/// Returns the configured scheduler metrics sink, or a no-op sink.
pub fn scheduler_metrics() -> &'static dyn SchedulerMetricsSink {
    SINK.get().copied().unwrap_or(&NOP_SINK)
}

// --- Trait Definitions ---

/// A sink for metrics related to the message sync engine.
pub trait SyncMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts a resolved anchor, labeled by outcome (`accepted`, `underpaid`, `rejected`, `not_found`).
    fn inc_resolved(&self, outcome: &'static str);
    /// Counts hashes requested from peers.
    fn inc_peer_requests(&self, count: u64);
    /// Sets the gauge of anchors whose content is still missing.
    fn set_missing_hashes(&self, count: u64);
    /// Counts completed bulk recoveries.
    fn inc_bulk_recoveries(&self);
    /// Counts temporary messages accepted from gossip.
    fn inc_temporary_received(&self);
}
impl SyncMetricsSink for NopSink {
    fn inc_resolved(&self, _outcome: &'static str) {}
    fn inc_peer_requests(&self, _count: u64) {}
    fn set_missing_hashes(&self, _count: u64) {}
    fn inc_bulk_recoveries(&self) {}
    fn inc_temporary_received(&self) {}
}

/// A sink for metrics related to the registry projector.
pub trait RegistryMetricsSink: Send + Sync + std::fmt::Debug {
    /// Counts messages folded into the registry, labeled by path (`live`, `rebuild`).
    fn inc_projected(&self, path: &'static str);
    /// Counts registry rows removed by expiry.
    fn inc_expired(&self, count: u64);
    /// Sets the gauge of registry rows.
    fn set_registry_size(&self, count: u64);
    /// Counts live-intake projections that exhausted their storage retries.
    fn inc_live_retry_exhausted(&self);
    /// Counts local uninstalls triggered by expiry.
    fn inc_local_removals(&self);
}
impl RegistryMetricsSink for NopSink {
    fn inc_projected(&self, _path: &'static str) {}
    fn inc_expired(&self, _count: u64) {}
    fn set_registry_size(&self, _count: u64) {}
    fn inc_live_retry_exhausted(&self) {}
    fn inc_local_removals(&self) {}
}

/// A sink for metrics related to the placement scheduler.
pub trait SchedulerMetricsSink: Send + Sync + std::fmt::Debug {
    /// Observes the duration of a single scheduler iteration.
    fn observe_tick_duration(&self, duration_secs: f64);
    /// Counts scheduler iterations, labeled by outcome.
    fn inc_tick_outcome(&self, outcome: &'static str);
    /// Counts install attempts, labeled by result (`ok`, `failed`).
    fn inc_installs(&self, result: &'static str);
    /// Counts self-removals after detecting over-replication.
    fn inc_self_removals(&self);
}
impl SchedulerMetricsSink for NopSink {
    fn observe_tick_duration(&self, _duration_secs: f64) {}
    fn inc_tick_outcome(&self, _outcome: &'static str) {}
    fn inc_installs(&self, _result: &'static str) {}
    fn inc_self_removals(&self) {}
}

/// A sink for recording structured error metrics.
pub trait ErrorMetricsSink: Send + Sync + std::fmt::Debug {
    /// Increments a counter for a specific error, categorized by its kind and variant.
    fn inc_error(&self, kind: &'static str, variant: &'static str);
}
impl ErrorMetricsSink for NopSink {
    fn inc_error(&self, _kind: &'static str, _variant: &'static str) {}
}

/// A unified sink that implements all domain-specific traits, providing a single
/// point of implementation for metrics backends like Prometheus.
pub trait MetricsSink:
    SyncMetricsSink + RegistryMetricsSink + SchedulerMetricsSink + ErrorMetricsSink
{
}

impl<T> MetricsSink for T where
    T: SyncMetricsSink + RegistryMetricsSink + SchedulerMetricsSink + ErrorMetricsSink
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fall_back_to_nop_sink() {
        sync_metrics().inc_resolved("accepted");
        registry_metrics().inc_expired(3);
        scheduler_metrics().inc_tick_outcome("idle");
        error_metrics().inc_error("sync", "SYNC_UNDERPAID");
        assert!(SINK.get().is_none());
    }
}
