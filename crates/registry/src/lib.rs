// Path: crates/registry/src/lib.rs
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

//! # Fleet Registry
//!
//! Folds the permanent message log into the current-specifications table and
//! keeps the gossiped placement books (running claims, installing
//! announcements, install failures).
//!
//! The projector applies last-height-wins: a row is replaced only by a message
//! anchored strictly higher, so duplicate and out-of-order delivery converge on
//! the same table. Expiry removes rows whose funded lifetime has lapsed and
//! uninstalls the matching local replicas.

pub mod locations;
mod projector;

pub use locations::LocationBook;
pub use projector::{ExpireReport, RebuildReport, RegistryProjector};
