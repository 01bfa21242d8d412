// Path: crates/api/src/transport.rs
use async_trait::async_trait;
use fleet_types::app::{AppMessage, GossipMessage, PeerSyncStatus};
use fleet_types::error::TransportError;

/// The peer-to-peer gossip transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a payload to every connected peer.
    async fn broadcast(&self, message: GossipMessage) -> Result<(), TransportError>;

    /// Asks peers for the message behind `hash`.
    async fn request(&self, hash: &str) -> Result<Option<AppMessage>, TransportError>;

    /// Asks peers for a batch of messages and returns whatever arrived.
    async fn request_many(&self, hashes: &[String]) -> Result<Vec<AppMessage>, TransportError>;

    /// Addresses of connected peers.
    async fn peers(&self) -> Vec<String>;

    /// A peer's own view of its message sync.
    async fn peer_status(&self, peer: &str) -> Result<PeerSyncStatus, TransportError>;

    /// Every permanently stored message held by `peer`.
    async fn fetch_permanent_messages(&self, peer: &str)
        -> Result<Vec<AppMessage>, TransportError>;
}
