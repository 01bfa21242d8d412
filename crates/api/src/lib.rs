// Path: crates/api/src/lib.rs

//! # Fleet API Crate Lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::indexing_slicing
    )
)]
//! # Fleet API
//!
//! The contracts between the three core subsystems and the outside world:
//! gossip transport, ledger daemon, pricing, specification validation,
//! container runtime, node probes, time and the abstract document store.
//! Concrete adapters live in `fleet-node`; in-memory doubles live in
//! `fleet-test-utils`.

/// Time sources usable under tokio's paused test clock.
pub mod clock;
/// The ledger daemon contract.
pub mod ledger;
/// Local node probes and the container runtime.
pub mod node;
/// Pricing and specification validation.
pub mod pricing;
/// Shared progress flags between subsystems.
pub mod progress;
/// The hand-off from the sync engine to the registry projector.
pub mod sink;
/// The abstract document store contract.
pub mod store;
/// The gossip transport contract.
pub mod transport;

/// A curated set of the most commonly used traits and types.
pub mod prelude {
    pub use crate::clock::{Clock, TokioClock};
    pub use crate::ledger::Ledger;
    pub use crate::node::{ContainerRuntime, NodeProbe};
    pub use crate::pricing::{Pricing, SpecValidator};
    pub use crate::progress::SyncProgress;
    pub use crate::sink::RegistrySink;
    pub use crate::store::{Document, DocumentStore, Filter, FindOptions, SortOrder};
    pub use crate::transport::Transport;
}
