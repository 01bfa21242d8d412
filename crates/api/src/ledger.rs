// Path: crates/api/src/ledger.rs
use async_trait::async_trait;
use fleet_types::app::LedgerStatus;
use fleet_types::error::TransportError;

/// The external ledger daemon.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether the daemon is synced, and its best height.
    async fn sync_status(&self) -> Result<LedgerStatus, TransportError>;

    /// Whether the network currently lists `address` as a confirmed node.
    async fn is_node_confirmed(&self, address: &str) -> Result<bool, TransportError>;
}
