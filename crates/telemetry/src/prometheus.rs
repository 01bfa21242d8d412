// Path: crates/telemetry/src/prometheus.rs
//! A concrete implementation of the metrics sinks using the Prometheus crate.
#![allow(clippy::expect_used)]

use crate::sinks::*;
use once_cell::sync::OnceCell;
use prometheus::{
    exponential_buckets, register_gauge, register_histogram, register_int_counter,
    register_int_counter_vec, Gauge, Histogram, IntCounter, IntCounterVec,
};

// --- Metric Statics ---

static SYNC_RESOLVED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SYNC_PEER_REQUESTS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SYNC_MISSING_HASHES: OnceCell<Gauge> = OnceCell::new();
static SYNC_BULK_RECOVERIES_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SYNC_TEMPORARY_RECEIVED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static REGISTRY_PROJECTED_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static REGISTRY_EXPIRED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static REGISTRY_SIZE: OnceCell<Gauge> = OnceCell::new();
static REGISTRY_LIVE_RETRY_EXHAUSTED_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static REGISTRY_LOCAL_REMOVALS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static SCHEDULER_TICK_DURATION_SECONDS: OnceCell<Histogram> = OnceCell::new();
static SCHEDULER_TICKS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SCHEDULER_INSTALLS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();
static SCHEDULER_SELF_REMOVALS_TOTAL: OnceCell<IntCounter> = OnceCell::new();
static ERRORS_TOTAL: OnceCell<IntCounterVec> = OnceCell::new();

/// The Prometheus-backed implementation of every sink trait.
#[derive(Debug, Clone, Copy)]
pub struct PrometheusSink;

/// Fetches a collector, panicking if `install()` has not run.
macro_rules! get_metric {
    ($metric:ident) => {
        $metric
            .get()
            .expect("Prometheus sink not initialized. Call telemetry::prometheus::install() first.")
    };
}

impl SyncMetricsSink for PrometheusSink {
    fn inc_resolved(&self, outcome: &'static str) {
        get_metric!(SYNC_RESOLVED_TOTAL)
            .with_label_values(&[outcome])
            .inc();
    }
    fn inc_peer_requests(&self, count: u64) {
        get_metric!(SYNC_PEER_REQUESTS_TOTAL).inc_by(count);
    }
    fn set_missing_hashes(&self, count: u64) {
        get_metric!(SYNC_MISSING_HASHES).set(count as f64);
    }
    fn inc_bulk_recoveries(&self) {
        get_metric!(SYNC_BULK_RECOVERIES_TOTAL).inc();
    }
    fn inc_temporary_received(&self) {
        get_metric!(SYNC_TEMPORARY_RECEIVED_TOTAL).inc();
    }
}

impl RegistryMetricsSink for PrometheusSink {
    fn inc_projected(&self, path: &'static str) {
        get_metric!(REGISTRY_PROJECTED_TOTAL)
            .with_label_values(&[path])
            .inc();
    }
    fn inc_expired(&self, count: u64) {
        get_metric!(REGISTRY_EXPIRED_TOTAL).inc_by(count);
    }
    fn set_registry_size(&self, count: u64) {
        get_metric!(REGISTRY_SIZE).set(count as f64);
    }
    fn inc_live_retry_exhausted(&self) {
        get_metric!(REGISTRY_LIVE_RETRY_EXHAUSTED_TOTAL).inc();
    }
    fn inc_local_removals(&self) {
        get_metric!(REGISTRY_LOCAL_REMOVALS_TOTAL).inc();
    }
}

impl SchedulerMetricsSink for PrometheusSink {
    fn observe_tick_duration(&self, duration_secs: f64) {
        get_metric!(SCHEDULER_TICK_DURATION_SECONDS).observe(duration_secs);
    }
    fn inc_tick_outcome(&self, outcome: &'static str) {
        get_metric!(SCHEDULER_TICKS_TOTAL)
            .with_label_values(&[outcome])
            .inc();
    }
    fn inc_installs(&self, result: &'static str) {
        get_metric!(SCHEDULER_INSTALLS_TOTAL)
            .with_label_values(&[result])
            .inc();
    }
    fn inc_self_removals(&self) {
        get_metric!(SCHEDULER_SELF_REMOVALS_TOTAL).inc();
    }
}

impl ErrorMetricsSink for PrometheusSink {
    fn inc_error(&self, kind: &'static str, variant: &'static str) {
        get_metric!(ERRORS_TOTAL)
            .with_label_values(&[kind, variant])
            .inc();
    }
}

/// Initializes all Prometheus metrics collectors and returns a static reference to the sink.
/// This function must be called only once at application startup.
pub fn install() -> Result<&'static dyn MetricsSink, prometheus::Error> {
    SYNC_RESOLVED_TOTAL
        .set(register_int_counter_vec!(
            "fleet_sync_resolved_total",
            "Anchors resolved by the sync engine, by outcome.",
            &["outcome"]
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SYNC_PEER_REQUESTS_TOTAL
        .set(register_int_counter!(
            "fleet_sync_peer_requests_total",
            "Message hashes requested from peers."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SYNC_MISSING_HASHES
        .set(register_gauge!(
            "fleet_sync_missing_hashes",
            "Anchors whose message content is not yet held."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SYNC_BULK_RECOVERIES_TOTAL
        .set(register_int_counter!(
            "fleet_sync_bulk_recoveries_total",
            "Completed bulk recoveries from a peer export."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SYNC_TEMPORARY_RECEIVED_TOTAL
        .set(register_int_counter!(
            "fleet_sync_temporary_received_total",
            "Unanchored messages accepted from gossip."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    REGISTRY_PROJECTED_TOTAL
        .set(register_int_counter_vec!(
            "fleet_registry_projected_total",
            "Messages folded into the registry, by path.",
            &["path"]
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    REGISTRY_EXPIRED_TOTAL
        .set(register_int_counter!(
            "fleet_registry_expired_total",
            "Registry rows removed by expiry."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    REGISTRY_SIZE
        .set(register_gauge!(
            "fleet_registry_size",
            "Current number of registry rows."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    REGISTRY_LIVE_RETRY_EXHAUSTED_TOTAL
        .set(register_int_counter!(
            "fleet_registry_live_retry_exhausted_total",
            "Live projections that gave up after bounded storage retries."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    REGISTRY_LOCAL_REMOVALS_TOTAL
        .set(register_int_counter!(
            "fleet_registry_local_removals_total",
            "Local apps uninstalled because their registry row expired."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SCHEDULER_TICK_DURATION_SECONDS
        .set(register_histogram!(
            "fleet_scheduler_tick_duration_seconds",
            "Latency of a single scheduler iteration.",
            exponential_buckets(0.01, 2.0, 16)?
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SCHEDULER_TICKS_TOTAL
        .set(register_int_counter_vec!(
            "fleet_scheduler_ticks_total",
            "Scheduler iterations, by outcome.",
            &["outcome"]
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SCHEDULER_INSTALLS_TOTAL
        .set(register_int_counter_vec!(
            "fleet_scheduler_installs_total",
            "Install attempts, by result.",
            &["result"]
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    SCHEDULER_SELF_REMOVALS_TOTAL
        .set(register_int_counter!(
            "fleet_scheduler_self_removals_total",
            "Replicas removed after detecting over-replication."
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;
    ERRORS_TOTAL
        .set(register_int_counter_vec!(
            "fleet_errors_total",
            "Total number of errors, categorized by type and variant.",
            &["kind", "variant"]
        )?)
        .map_err(|_| prometheus::Error::AlreadyReg)?;

    static SINK: PrometheusSink = PrometheusSink;
    Ok(&SINK)
}
