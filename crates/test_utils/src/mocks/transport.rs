// Path: crates/test_utils/src/mocks/transport.rs
use async_trait::async_trait;
use fleet_api::transport::Transport;
use fleet_types::app::{AppMessage, GossipMessage, PeerSyncStatus};
use fleet_types::error::TransportError;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    served: HashMap<String, AppMessage>,
    requests: Vec<String>,
    broadcasts: Vec<GossipMessage>,
    peers: Vec<(String, Option<PeerSyncStatus>, Vec<AppMessage>)>,
}

/// A transport whose peers answer from a fixed set of messages.
#[derive(Debug, Default)]
pub struct MockTransport {
    state: Mutex<State>,
}

impl MockTransport {
    /// A transport with no peers and nothing to serve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes peers answer requests for `message.hash`.
    pub fn serve(&self, message: AppMessage) {
        self.state
            .lock()
            .served
            .insert(message.hash.clone(), message);
    }

    /// Adds a peer. `None` status makes the peer unreachable.
    pub fn add_peer(&self, peer: &str, status: Option<PeerSyncStatus>, export: Vec<AppMessage>) {
        self.state
            .lock()
            .peers
            .push((peer.to_string(), status, export));
    }

    /// Every hash requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Every payload broadcast so far, in order.
    pub fn broadcasts(&self) -> Vec<GossipMessage> {
        self.state.lock().broadcasts.clone()
    }

    /// Total network calls made through this transport.
    pub fn network_calls(&self) -> usize {
        let s = self.state.lock();
        s.requests.len() + s.broadcasts.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn broadcast(&self, message: GossipMessage) -> Result<(), TransportError> {
        self.state.lock().broadcasts.push(message);
        Ok(())
    }

    async fn request(&self, hash: &str) -> Result<Option<AppMessage>, TransportError> {
        let mut s = self.state.lock();
        s.requests.push(hash.to_string());
        Ok(s.served.get(hash).cloned())
    }

    async fn request_many(&self, hashes: &[String]) -> Result<Vec<AppMessage>, TransportError> {
        let mut s = self.state.lock();
        s.requests.extend(hashes.iter().cloned());
        Ok(hashes
            .iter()
            .filter_map(|h| s.served.get(h).cloned())
            .collect())
    }

    async fn peers(&self) -> Vec<String> {
        self.state
            .lock()
            .peers
            .iter()
            .map(|(p, _, _)| p.clone())
            .collect()
    }

    async fn peer_status(&self, peer: &str) -> Result<PeerSyncStatus, TransportError> {
        self.state
            .lock()
            .peers
            .iter()
            .find(|(p, _, _)| p == peer)
            .and_then(|(_, status, _)| *status)
            .ok_or_else(|| TransportError::Unreachable(peer.to_string()))
    }

    async fn fetch_permanent_messages(
        &self,
        peer: &str,
    ) -> Result<Vec<AppMessage>, TransportError> {
        self.state
            .lock()
            .peers
            .iter()
            .find(|(p, _, _)| p == peer)
            .map(|(_, _, export)| export.clone())
            .ok_or_else(|| TransportError::Unreachable(peer.to_string()))
    }
}
