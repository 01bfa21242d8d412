// Path: crates/node/src/tasks.rs
//! Periodic loops driving the sync engine and registry upkeep.

use fleet_registry::{LocationBook, RegistryProjector};
use fleet_sync::MessageSyncEngine;
use fleet_telemetry::error_metrics;
use fleet_types::config::{RegistryConfig, SyncConfig};
use fleet_types::error::ErrorCode;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

fn every(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

fn report<T, E: ErrorCode + Display>(job: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error_metrics().inc_error("node", e.code());
            tracing::warn!(target: "node", job, error = %e, "periodic job failed");
            None
        }
    }
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown too.
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Catch-up, periodic sweeps, reconciliation and temporary-message purging.
///
/// The first sweep tick after startup keeps retrying catch-up until it
/// succeeds; only then do regular sweeps start.
pub async fn sync_loop(
    engine: Arc<MessageSyncEngine>,
    config: SyncConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(target: "node", "sync loop started");
    tokio::select! {
        result = engine.catch_up() => { report("catch_up", result); }
        _ = stopped(&mut shutdown) => return,
    }

    let mut sweep = every(config.sweep_interval());
    let mut reconcile = every(config.reconcile_interval());
    let mut purge = every(config.purge_interval());
    loop {
        tokio::select! {
            _ = sweep.tick() => {
                if engine.progress().is_initial_recovery_done() {
                    if let Some(r) = report("sweep", engine.sweep_missing(false).await) {
                        tracing::debug!(target: "node", resolved = r.resolved, "sweep finished");
                    }
                } else {
                    report("catch_up", engine.catch_up().await);
                }
            }
            _ = reconcile.tick() => {
                if let Some(repaired) = report("reconcile", engine.reconcile()) {
                    tracing::debug!(target: "node", repaired, "reconcile finished");
                }
            }
            _ = purge.tick() => {
                report("purge_temporary", engine.purge_temporary());
            }
            _ = stopped(&mut shutdown) => break,
        }
    }
    tracing::info!(target: "node", "sync loop stopped");
}

/// Registry expiry and location-table purging.
pub async fn expiry_loop(
    projector: Arc<RegistryProjector>,
    locations: LocationBook,
    config: RegistryConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(target: "node", "expiry loop started");
    let mut ticks = every(config.expiry_interval());
    loop {
        tokio::select! {
            _ = ticks.tick() => {
                if let Some(r) = report("expire", projector.expire().await) {
                    tracing::debug!(target: "node", report = ?r, "expiry pass finished");
                }
                report("purge_locations", locations.purge_expired());
            }
            _ = stopped(&mut shutdown) => break,
        }
    }
    tracing::info!(target: "node", "expiry loop stopped");
}
