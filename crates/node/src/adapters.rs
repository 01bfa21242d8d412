// Path: crates/node/src/adapters.rs
//! HTTP adapters for the collaborators the engines are written against.
//!
//! [`HttpPeerTransport`] talks to the peer routes of other nodes (see
//! [`crate::admin`]). [`LocalDaemon`] talks to the daemon running beside the
//! node, which fronts the ledger, the container runtime and the host probes.

use async_trait::async_trait;
use fleet_api::ledger::Ledger;
use fleet_api::node::{ContainerRuntime, NodeProbe};
use fleet_api::transport::Transport;
use fleet_types::app::{
    AppMessage, AppSpecification, GossipMessage, LedgerStatus, LocalApp, NodeCapability, NodeGeo,
    PeerSyncStatus,
};
use fleet_types::error::{RuntimeError, TransportError};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

fn transport_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_decode() {
        TransportError::InvalidResponse(e.to_string())
    } else {
        TransportError::Unreachable(e.to_string())
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Decodes a JSON body, mapping non-success statuses to errors.
async fn json_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::InvalidResponse(format!(
            "{} answered {status}",
            response.url()
        )));
    }
    response.json().await.map_err(transport_error)
}

/// Gossip and peer queries over the HTTP peer routes of a static peer list.
#[derive(Debug, Clone)]
pub struct HttpPeerTransport {
    client: Client,
    peers: Vec<String>,
    export_timeout: Duration,
}

impl HttpPeerTransport {
    /// Creates a transport for `peers`, given as base URLs.
    pub fn new(
        peers: Vec<String>,
        request_timeout: Duration,
        export_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            client,
            peers,
            export_timeout,
        })
    }

    async fn fetch_one(&self, peer: &str, hash: &str) -> Result<Option<AppMessage>, TransportError> {
        let response = self
            .client
            .get(join(peer, &format!("/messages/{hash}")))
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        json_body(response).await.map(Some)
    }
}

#[async_trait]
impl Transport for HttpPeerTransport {
    async fn broadcast(&self, message: GossipMessage) -> Result<(), TransportError> {
        let sends = self.peers.iter().map(|peer| {
            let message = &message;
            async move {
                let response = self
                    .client
                    .post(join(peer, "/gossip"))
                    .json(message)
                    .send()
                    .await
                    .map_err(transport_error)?;
                if response.status().is_success() {
                    Ok::<(), TransportError>(())
                } else {
                    Err(TransportError::InvalidResponse(format!(
                        "{peer} answered {}",
                        response.status()
                    )))
                }
            }
        });
        let mut delivered = 0;
        let mut last_error = None;
        for (peer, sent) in self.peers.iter().zip(join_all(sends).await) {
            match sent {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::debug!(target: "node", peer = %peer, kind = message.kind(), error = %e, "gossip delivery failed");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if delivered == 0 => Err(e),
            _ => Ok(()),
        }
    }

    async fn request(&self, hash: &str) -> Result<Option<AppMessage>, TransportError> {
        let mut answered = 0;
        let mut last_error = None;
        for peer in &self.peers {
            match self.fetch_one(peer, hash).await {
                Ok(Some(message)) => return Ok(Some(message)),
                Ok(None) => answered += 1,
                Err(e) => last_error = Some(e),
            }
        }
        match last_error {
            Some(e) if answered == 0 => Err(e),
            _ => Ok(None),
        }
    }

    async fn request_many(&self, hashes: &[String]) -> Result<Vec<AppMessage>, TransportError> {
        let mut wanted: HashSet<&str> = hashes.iter().map(String::as_str).collect();
        let mut found = Vec::new();
        for peer in &self.peers {
            if wanted.is_empty() {
                break;
            }
            let batch: Vec<&str> = wanted.iter().copied().collect();
            let response = self
                .client
                .post(join(peer, "/messages/batch"))
                .json(&batch)
                .send()
                .await
                .map_err(transport_error);
            let messages: Vec<AppMessage> = match response {
                Ok(r) => match json_body(r).await {
                    Ok(messages) => messages,
                    Err(e) => {
                        tracing::debug!(target: "node", peer = %peer, error = %e, "batch request failed");
                        continue;
                    }
                },
                Err(e) => {
                    tracing::debug!(target: "node", peer = %peer, error = %e, "batch request failed");
                    continue;
                }
            };
            for message in messages {
                if wanted.remove(message.hash.as_str()) {
                    found.push(message);
                }
            }
        }
        Ok(found)
    }

    async fn peers(&self) -> Vec<String> {
        self.peers.clone()
    }

    async fn peer_status(&self, peer: &str) -> Result<PeerSyncStatus, TransportError> {
        let response = self
            .client
            .get(join(peer, "/sync/status"))
            .send()
            .await
            .map_err(transport_error)?;
        json_body(response).await
    }

    async fn fetch_permanent_messages(
        &self,
        peer: &str,
    ) -> Result<Vec<AppMessage>, TransportError> {
        let response = self
            .client
            .get(join(peer, "/sync/export"))
            .timeout(self.export_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        json_body(response).await
    }
}

#[derive(Deserialize)]
struct Confirmed {
    confirmed: bool,
}

#[derive(Deserialize)]
struct Address {
    address: Option<String>,
}

#[derive(Deserialize)]
struct Flag {
    value: bool,
}

/// Client of the local daemon fronting the ledger, runtime and host probes.
#[derive(Debug, Clone)]
pub struct LocalDaemon {
    client: Client,
    base: String,
}

impl LocalDaemon {
    /// Creates a client for the daemon at `base`.
    pub fn new(base: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            client,
            base: base.into(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let response = self
            .client
            .get(join(&self.base, path))
            .send()
            .await
            .map_err(transport_error)?;
        json_body(response).await
    }

    fn runtime_error(e: reqwest::Error) -> RuntimeError {
        RuntimeError::Query(e.to_string())
    }
}

#[async_trait]
impl Ledger for LocalDaemon {
    async fn sync_status(&self) -> Result<LedgerStatus, TransportError> {
        self.get("/ledger/status").await
    }

    async fn is_node_confirmed(&self, address: &str) -> Result<bool, TransportError> {
        let answer: Confirmed = self
            .get(&format!("/ledger/nodes/{address}/confirmed"))
            .await?;
        Ok(answer.confirmed)
    }
}

#[async_trait]
impl ContainerRuntime for LocalDaemon {
    async fn installed(&self) -> Result<Vec<LocalApp>, RuntimeError> {
        self.client
            .get(join(&self.base, "/apps"))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(Self::runtime_error)?
            .json()
            .await
            .map_err(Self::runtime_error)
    }

    async fn install(&self, spec: &AppSpecification) -> Result<(), RuntimeError> {
        let response = self
            .client
            .post(join(&self.base, "/apps"))
            .json(spec)
            .send()
            .await
            .map_err(|e| RuntimeError::Install {
                name: spec.name.clone(),
                reason: e.to_string(),
            })?;
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let reason = response.text().await.unwrap_or_default();
        Err(RuntimeError::Install {
            name: spec.name.clone(),
            reason: format!("{status}: {reason}"),
        })
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.client
            .delete(join(&self.base, &format!("/apps/{name}")))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| RuntimeError::Remove {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl NodeProbe for LocalDaemon {
    async fn capability(&self) -> Result<NodeCapability, TransportError> {
        self.get("/node/capability").await
    }

    async fn public_address(&self) -> Result<Option<String>, TransportError> {
        let answer: Address = self.get("/node/address").await?;
        Ok(answer.address)
    }

    async fn port_reachable(&self, port: u16) -> Result<bool, TransportError> {
        let answer: Flag = self.get(&format!("/node/ports/{port}/reachable")).await?;
        Ok(answer.value)
    }

    async fn port_free_locally(&self, port: u16) -> Result<bool, TransportError> {
        let answer: Flag = self.get(&format!("/node/ports/{port}/free")).await?;
        Ok(answer.value)
    }

    async fn geolocation(&self) -> Result<Option<NodeGeo>, TransportError> {
        self.get("/node/geolocation").await
    }
}
