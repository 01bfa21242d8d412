// Path: crates/types/src/lib.rs
#![forbid(unsafe_code)]
#![deny(missing_docs)]
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

//! # Fleet Types
//!
//! The foundational crate of the fleet node workspace. It holds the data model
//! shared by the message sync engine, the registry projector and the placement
//! scheduler: application messages and their on-chain anchors, registry rows,
//! location records, gossip payloads, error enums and configuration.
//!
//! ## Architectural Role
//!
//! Every other crate depends on `fleet-types`, and `fleet-types` depends on no
//! other workspace crate. Keeping the canonical definitions here avoids
//! circular dependencies between the three core subsystems.

/// Application-level data structures (messages, specifications, locations).
pub mod app;
/// Shared configuration structures with tuned defaults.
pub mod config;
/// A unified set of error types used across the workspace.
pub mod error;
/// Canonical serialization and message hash verification.
pub mod hashing;

/// A block height on the external ledger.
pub type Height = u64;

/// Milliseconds since the unix epoch.
pub type TimestampMs = u64;
