// Path: crates/types/src/hashing.rs
//! Canonical serialization and message digest verification.
//!
//! A message hash is the lowercase hex SHA-256 digest of
//! `type ‖ version ‖ canonical(specification) ‖ timestamp ‖ signature`, where
//! the canonical form is compact JSON with keys in their original order.
//! Messages with `version <= 3` were signed by clients that emitted the
//! `ports` and `containerPorts` keys in the opposite order, so verification
//! retries with those two keys swapped before rejecting.

use crate::app::{AppMessage, MessageType};
use crate::error::HashError;
use crate::TimestampMs;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Highest specification version that may need the legacy key order.
pub const LEGACY_MAX_VERSION: u32 = 3;

const LEGACY_SWAP: (&str, &str) = ("ports", "containerPorts");

/// Compact JSON of `spec`, preserving insertion order.
pub fn canonical_form(spec: &Value) -> Result<String, HashError> {
    serde_json::to_string(spec).map_err(|e| HashError::Canonical(e.to_string()))
}

/// Computes the digest of a message's signed contents.
pub fn compute_hash(
    message_type: MessageType,
    version: u32,
    spec: &Value,
    timestamp: TimestampMs,
    signature: &str,
) -> Result<String, HashError> {
    let canonical = canonical_form(spec)?;
    let mut hasher = Sha256::new();
    hasher.update(message_type.as_str().as_bytes());
    hasher.update(version.to_string().as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(signature.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Returns `spec` with the `ports` and `containerPorts` keys trading places.
///
/// Returns `None` unless both keys are present at the top level.
pub fn legacy_reordered(spec: &Value) -> Option<Value> {
    let obj = spec.as_object()?;
    let (a, b) = LEGACY_SWAP;
    let va = obj.get(a)?;
    let vb = obj.get(b)?;
    let mut out = Map::with_capacity(obj.len());
    for (k, v) in obj {
        if k == a {
            out.insert(b.to_string(), vb.clone());
        } else if k == b {
            out.insert(a.to_string(), va.clone());
        } else {
            out.insert(k.clone(), v.clone());
        }
    }
    Some(Value::Object(out))
}

/// Checks the message hash, applying the legacy fallback for old versions.
pub fn check_hash(message: &AppMessage) -> Result<(), HashError> {
    let computed = compute_hash(
        message.message_type,
        message.version,
        &message.specification,
        message.timestamp,
        &message.signature,
    )?;
    if computed == message.hash {
        return Ok(());
    }
    if message.version <= LEGACY_MAX_VERSION {
        if let Some(reordered) = legacy_reordered(&message.specification) {
            let legacy = compute_hash(
                message.message_type,
                message.version,
                &reordered,
                message.timestamp,
                &message.signature,
            )?;
            if legacy == message.hash {
                return Ok(());
            }
        }
    }
    Err(HashError::Mismatch {
        expected: message.hash.clone(),
        computed,
    })
}

/// True iff the stored hash matches the recomputed digest.
pub fn verify_hash(message: &AppMessage) -> bool {
    check_hash(message).is_ok()
}
