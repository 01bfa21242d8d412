// Path: crates/sync/src/lib.rs
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

//! # Fleet Sync
//!
//! Keeps a node's message store in step with the anchors reported by the
//! ledger. Given an anchored hash, the [`MessageSyncEngine`] finds the signed
//! message behind it (in the temporary cache, or from peers), checks that the
//! anchoring payment covers the due price, stores it permanently and hands
//! accepted messages to the registry.
//!
//! Missing content is chased in three ways: a bounded live retry per anchor,
//! a periodic batched sweep over every missing anchor, and a one-shot bulk
//! recovery from a synced peer's export for freshly joined nodes.

mod engine;
pub mod price_gate;
pub mod pricing;
mod recovery;
mod sweep;
pub mod validation;

pub use engine::{IntakeOutcome, MessageSyncEngine, SyncContext};
pub use pricing::LinearPricing;
pub use recovery::BulkReport;
pub use sweep::SweepReport;
pub use validation::StructuralValidator;
