// Path: crates/test_utils/src/fixtures.rs
//! Signed messages and specifications for tests.

use fleet_storage::{Collections, MemoryStore};
use fleet_types::app::{Anchor, AppMessage, AppSpecification, MessageType};
use fleet_types::hashing::compute_hash;
use fleet_types::{Height, TimestampMs};
use serde_json::{json, Value};
use std::sync::Arc;

/// Ledger units per coin used by the fixtures.
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// A composed specification object with a single component.
pub fn spec_json(name: &str, cpu: f64, ram: u64, hdd: u64, instances: u32) -> Value {
    json!({
        "version": 7,
        "name": name,
        "description": format!("{name} test app"),
        "owner": "owner-1",
        "instances": instances,
        "compose": [{
            "name": "main",
            "repotag": format!("example/{name}:latest"),
            "ports": [31000],
            "containerPorts": [80],
            "cpu": cpu,
            "ram": ram,
            "hdd": hdd
        }]
    })
}

/// Adds or replaces a top-level field of a specification object.
pub fn with_field(mut spec: Value, key: &str, value: Value) -> Value {
    if let Some(obj) = spec.as_object_mut() {
        obj.insert(key.to_string(), value);
    }
    spec
}

/// A correctly hashed, unanchored message.
pub fn signed_message(
    message_type: MessageType,
    specification: Value,
    timestamp: TimestampMs,
) -> AppMessage {
    let version = specification
        .get("version")
        .and_then(Value::as_u64)
        .unwrap_or(7) as u32;
    let signature = format!("sig-{timestamp}");
    let hash = compute_hash(message_type, version, &specification, timestamp, &signature)
        .unwrap_or_default();
    AppMessage {
        message_type,
        version,
        specification,
        hash,
        timestamp,
        signature,
        txid: String::new(),
        height: 0,
        paid_amount: 0,
    }
}

/// A registration message for `spec_json(name, 1.0, 1000, 10, 3)`.
pub fn register(name: &str, timestamp: TimestampMs) -> AppMessage {
    signed_message(
        MessageType::Register,
        spec_json(name, 1.0, 1000, 10, 3),
        timestamp,
    )
}

/// An anchor for `message` at `height` paying `coins`.
pub fn anchor_for(message: &AppMessage, height: Height, coins: f64) -> Anchor {
    Anchor {
        hash: message.hash.clone(),
        txid: format!("tx-{}", message.hash.chars().take(8).collect::<String>()),
        height,
        paid_amount: (coins * UNITS_PER_COIN as f64).round() as u64,
    }
}

/// `message` with its anchor fields filled in.
pub fn anchored(message: &AppMessage, height: Height, coins: f64) -> AppMessage {
    message.anchored(&anchor_for(message, height, coins))
}

/// A typed registry row.
pub fn registry_row(name: &str, height: Height, instances: u32) -> AppSpecification {
    let mut spec: AppSpecification =
        serde_json::from_value(spec_json(name, 1.0, 1000, 10, instances)).unwrap_or_default();
    spec.height = height;
    spec.hash = format!("hash-{name}-{height}");
    spec
}

/// Typed collections over a fresh in-memory store.
pub fn memory_collections() -> Collections {
    Collections::new(Arc::new(MemoryStore::new()))
}
