// Path: crates/telemetry/src/lib.rs
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Fleet Telemetry
//!
//! This crate provides the observability infrastructure for the fleet node,
//! including structured logging initialization, a Prometheus metrics endpoint,
//! and abstract sinks for decoupling metric instrumentation from the backend.

/// A lightweight HTTP server for exposing `/metrics` and `/healthz` endpoints.
pub mod http;
/// The initialization routine for global structured logging.
pub mod init;
/// The concrete implementation of metrics sinks using the `prometheus` crate.
pub mod prometheus;
/// Abstract traits (`*MetricsSink`) that define the contract for metrics reporting.
pub mod sinks;
/// Timing of scheduler iterations.
pub mod time;

pub use sinks::{error_metrics, registry_metrics, scheduler_metrics, sync_metrics};
