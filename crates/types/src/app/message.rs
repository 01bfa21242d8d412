// Path: crates/types/src/app/message.rs
use super::AppSpecification;
use crate::{Height, TimestampMs};
use serde::{Deserialize, Serialize};

/// The kind of registry write a message performs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// First registration of an application name.
    Register,
    /// A replacement specification for an already registered name.
    Update,
}

impl MessageType {
    /// The wire string, which is also the first input of the message digest.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Update => "update",
        }
    }
}

/// A signed application message, as gossiped and as stored.
///
/// The anchor fields (`txid`, `height`, `paid_amount`) are empty while the
/// message only lives in the temporary store and are filled in from the
/// ledger anchor when the message is promoted to permanent storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppMessage {
    /// Register or update.
    #[serde(rename = "type")]
    pub message_type: MessageType,
    /// Specification schema version.
    pub version: u32,
    /// The raw specification object. Key order is significant for hashing.
    pub specification: serde_json::Value,
    /// Hex digest over the message contents.
    pub hash: String,
    /// Owner signing time in milliseconds.
    pub timestamp: TimestampMs,
    /// Owner signature over the message.
    pub signature: String,
    /// Anchoring transaction id.
    #[serde(default)]
    pub txid: String,
    /// Anchoring block height.
    #[serde(default)]
    pub height: Height,
    /// Amount paid by the anchoring transaction, in the smallest ledger unit.
    #[serde(default)]
    pub paid_amount: u64,
}

impl AppMessage {
    /// Decodes the typed specification from the raw object.
    pub fn spec(&self) -> Result<AppSpecification, serde_json::Error> {
        serde_json::from_value(self.specification.clone())
    }

    /// Returns the application name carried by the specification, if any.
    pub fn app_name(&self) -> Option<&str> {
        self.specification.get("name").and_then(|v| v.as_str())
    }

    /// Returns a copy of this message with the anchor fields filled in.
    pub fn anchored(&self, anchor: &Anchor) -> Self {
        Self {
            txid: anchor.txid.clone(),
            height: anchor.height,
            paid_amount: anchor.paid_amount,
            ..self.clone()
        }
    }
}

/// A message held in permanent storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    /// The anchored message.
    #[serde(flatten)]
    pub message: AppMessage,
    /// Set when the anchor paid less than the due price. Underpaid messages
    /// are kept so they are not fetched again, but never projected.
    #[serde(default)]
    pub underpaid: bool,
}

/// A message received over gossip that has no confirmed anchor yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryMessage {
    /// The unanchored message.
    #[serde(flatten)]
    pub message: AppMessage,
    /// Local receive time.
    pub received_at: TimestampMs,
}

/// An on-chain reference proving a message was accepted by the network.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    /// Message hash.
    pub hash: String,
    /// Anchoring transaction id.
    pub txid: String,
    /// Anchoring block height.
    pub height: Height,
    /// Amount paid, in the smallest ledger unit.
    pub paid_amount: u64,
}

/// Tracks whether this node holds the content behind an anchor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HashRecord {
    /// Message hash.
    pub hash: String,
    /// Anchoring transaction id.
    pub txid: String,
    /// Anchoring block height.
    pub height: Height,
    /// Amount paid, in the smallest ledger unit.
    pub paid_amount: u64,
    /// True once the permanent store holds the message.
    #[serde(default)]
    pub has_message: bool,
    /// True once the sweep gave up on finding the message.
    #[serde(default)]
    pub message_not_found: bool,
}

impl HashRecord {
    /// Creates a record for a freshly reported anchor.
    pub fn new(anchor: Anchor) -> Self {
        Self {
            hash: anchor.hash,
            txid: anchor.txid,
            height: anchor.height,
            paid_amount: anchor.paid_amount,
            has_message: false,
            message_not_found: false,
        }
    }

    /// Returns the anchor this record describes.
    pub fn anchor(&self) -> Anchor {
        Anchor {
            hash: self.hash.clone(),
            txid: self.txid.clone(),
            height: self.height,
            paid_amount: self.paid_amount,
        }
    }
}
