// Path: crates/storage/src/lib.rs
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

//! Document store backends and typed collection access for the fleet node.

pub mod collections;
pub mod memory;
pub mod redb_store;

pub use collections::Collections;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use fleet_types::error::StoreError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Serializes a value into a document.
pub fn to_document<T: Serialize>(value: &T) -> Result<fleet_api::store::Document, StoreError> {
    match serde_json::to_value(value).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encode(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Deserializes a document.
pub fn from_document<T: DeserializeOwned>(doc: fleet_api::store::Document) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(doc)).map_err(|e| StoreError::Decode(e.to_string()))
}
