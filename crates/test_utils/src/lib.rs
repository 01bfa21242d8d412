// Path: crates/test_utils/src/lib.rs
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

//! # Fleet Test Utilities
//!
//! In-memory doubles of every collaborator the fleet subsystems consume, plus
//! fixtures for signed messages and specifications.

pub mod clock;
pub mod fixtures;
pub mod mocks;
