// Path: crates/types/src/error/mod.rs
//! Core error types for the fleet node.

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors raised by a document store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend failed to read or write.
    #[error("Store backend error: {0}")]
    Backend(String),
    /// A value could not be serialized into a document.
    #[error("Encode error: {0}")]
    Encode(String),
    /// A stored document could not be deserialized.
    #[error("Decode error: {0}")]
    Decode(String),
    /// A filter or projection was malformed.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "STORE_BACKEND_ERROR",
            Self::Encode(_) => "STORE_ENCODE_ERROR",
            Self::Decode(_) => "STORE_DECODE_ERROR",
            Self::InvalidQuery(_) => "STORE_INVALID_QUERY",
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors raised by the gossip transport or a peer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer could not be reached.
    #[error("Peer unreachable: {0}")]
    Unreachable(String),
    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,
    /// The peer answered with something unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "TRANSPORT_UNREACHABLE",
            Self::Timeout => "TRANSPORT_TIMEOUT",
            Self::InvalidResponse(_) => "TRANSPORT_INVALID_RESPONSE",
        }
    }
}

/// Errors raised by the local container runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Listing installed apps failed.
    #[error("Failed to list installed apps: {0}")]
    Query(String),
    /// Installing an app failed.
    #[error("Install of {name} failed: {reason}")]
    Install {
        /// Application name.
        name: String,
        /// Runtime failure.
        reason: String,
    },
    /// Removing an app failed.
    #[error("Removal of {name} failed: {reason}")]
    Remove {
        /// Application name.
        name: String,
        /// Runtime failure.
        reason: String,
    },
}

impl ErrorCode for RuntimeError {
    fn code(&self) -> &'static str {
        match self {
            Self::Query(_) => "RUNTIME_QUERY_FAILED",
            Self::Install { .. } => "RUNTIME_INSTALL_FAILED",
            Self::Remove { .. } => "RUNTIME_REMOVE_FAILED",
        }
    }
}

/// Errors raised while checking a message digest.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum HashError {
    /// The specification could not be serialized.
    #[error("Canonical serialization failed: {0}")]
    Canonical(String),
    /// Neither the primary nor the legacy digest matched.
    #[error("Hash mismatch: expected {expected}, computed {computed}")]
    Mismatch {
        /// The hash carried by the message.
        expected: String,
        /// The digest computed locally.
        computed: String,
    },
}

impl ErrorCode for HashError {
    fn code(&self) -> &'static str {
        match self {
            Self::Canonical(_) => "HASH_CANONICAL_FAILED",
            Self::Mismatch { .. } => "HASH_MISMATCH",
        }
    }
}

/// Errors raised by the message sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A storage operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    /// A transport operation failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// A message failed digest verification.
    #[error("Hash error: {0}")]
    Hash(#[from] HashError),
    /// A specification failed validation.
    #[error("Invalid specification: {0}")]
    InvalidSpec(String),
    /// No price table row covers the message height.
    #[error("No price table row for height {0}")]
    NoPriceFork(u64),
    /// Pricing failed for a specification.
    #[error("Pricing failed: {0}")]
    Pricing(String),
    /// The anchor paid less than the due price.
    #[error("Underpaid: paid {paid}, due {due}")]
    Underpaid {
        /// The paid amount, in coins.
        paid: f64,
        /// The due price, in coins.
        due: f64,
    },
    /// Bulk recovery found no peer able to serve an export.
    #[error("No synced peer available for bulk recovery")]
    NoSyncedPeer,
    /// Projecting an accepted message into the registry failed.
    #[error("Projection failed: {0}")]
    Projection(#[from] RegistryError),
}

impl ErrorCode for SyncError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "SYNC_STORE_ERROR",
            Self::Transport(_) => "SYNC_TRANSPORT_ERROR",
            Self::Hash(_) => "SYNC_HASH_ERROR",
            Self::InvalidSpec(_) => "SYNC_INVALID_SPEC",
            Self::NoPriceFork(_) => "SYNC_NO_PRICE_FORK",
            Self::Pricing(_) => "SYNC_PRICING_FAILED",
            Self::Underpaid { .. } => "SYNC_UNDERPAID",
            Self::NoSyncedPeer => "SYNC_NO_SYNCED_PEER",
            Self::Projection(_) => "SYNC_PROJECTION_FAILED",
        }
    }
}

/// Errors raised by the registry projector and the location books.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// A storage operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    /// A message carried a specification that could not be decoded.
    #[error("Malformed specification in message {hash}: {reason}")]
    MalformedSpec {
        /// Hash of the offending message.
        hash: String,
        /// Decode failure.
        reason: String,
    },
    /// The bounded live-intake retry gave up.
    #[error("Storage retries exhausted after {attempts} attempts for {hash}")]
    RetriesExhausted {
        /// Hash of the message that could not be projected.
        hash: String,
        /// Attempts made.
        attempts: u32,
    },
    /// The ledger daemon could not be queried.
    #[error("Ledger error: {0}")]
    Ledger(#[from] TransportError),
    /// The container runtime refused an uninstall.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "REGISTRY_STORE_ERROR",
            Self::MalformedSpec { .. } => "REGISTRY_MALFORMED_SPEC",
            Self::RetriesExhausted { .. } => "REGISTRY_RETRIES_EXHAUSTED",
            Self::Ledger(_) => "REGISTRY_LEDGER_ERROR",
            Self::Runtime(_) => "REGISTRY_RUNTIME_ERROR",
        }
    }
}

/// Errors raised by the placement scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A storage operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    /// A registry read failed.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
    /// A transport operation failed.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    /// The container runtime failed.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

impl ErrorCode for SchedulerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Store(_) => "SCHEDULER_STORE_ERROR",
            Self::Registry(_) => "SCHEDULER_REGISTRY_ERROR",
            Self::Transport(_) => "SCHEDULER_TRANSPORT_ERROR",
            Self::Runtime(_) => "SCHEDULER_RUNTIME_ERROR",
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config {path}: {reason}")]
    Read {
        /// Path of the file.
        path: String,
        /// I/O failure.
        reason: String,
    },
    /// The file is not valid TOML for the expected schema.
    #[error("Failed to parse config: {0}")]
    Parse(String),
    /// A value is out of range.
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => "CONFIG_READ_FAILED",
            Self::Parse(_) => "CONFIG_PARSE_FAILED",
            Self::Invalid(_) => "CONFIG_INVALID_VALUE",
        }
    }
}
