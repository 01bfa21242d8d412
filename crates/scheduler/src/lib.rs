// Path: crates/scheduler/src/lib.rs
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

//! # Fleet Scheduler
//!
//! The per-node placement loop. Every node runs one [`PlacementScheduler`]; it
//! finds applications running fewer replicas than their owners asked for and
//! decides whether this node should start one.
//!
//! There is no coordinator. Nodes that see the same deficit announce their
//! intent over gossip, wait for the announcements to spread, then rank every
//! announcement by broadcast time and only the earliest ones proceed. Nodes
//! that overshoot anyway notice after installing and remove their own replica.

pub mod cache;
pub mod compliance;
pub mod deferred;
pub mod eligibility;
pub mod ranking;
mod scheduler;

pub use scheduler::{PlacementScheduler, SchedulerContext, TickOutcome};
