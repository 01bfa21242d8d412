// Path: crates/api/src/node.rs
use async_trait::async_trait;
use fleet_types::app::{AppSpecification, LocalApp, NodeCapability, NodeGeo};
use fleet_types::error::{RuntimeError, TransportError};

/// Local container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Apps currently installed on this node.
    async fn installed(&self) -> Result<Vec<LocalApp>, RuntimeError>;
    /// Installs and starts every component of `spec`.
    async fn install(&self, spec: &AppSpecification) -> Result<(), RuntimeError>;
    /// Stops and removes an installed app.
    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;
}

/// Probes of the local node and its reachability.
#[async_trait]
pub trait NodeProbe: Send + Sync {
    /// Health, tier and free hardware of this node.
    async fn capability(&self) -> Result<NodeCapability, TransportError>;
    /// Public `host[:port]` of this node, once known.
    async fn public_address(&self) -> Result<Option<String>, TransportError>;
    /// Whether `port` is reachable from outside.
    async fn port_reachable(&self, port: u16) -> Result<bool, TransportError>;
    /// Whether `port` is unbound on this host.
    async fn port_free_locally(&self, port: u16) -> Result<bool, TransportError>;
    /// Where this node is, if the lookup succeeded.
    async fn geolocation(&self) -> Result<Option<NodeGeo>, TransportError>;
}
