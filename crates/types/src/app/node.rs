// Path: crates/types/src/app/node.rs
use crate::Height;
use serde::{Deserialize, Serialize};

/// A node's declared hardware class.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CapacityTier {
    /// The plentiful, smaller class.
    Common,
    /// The larger, scarcer class.
    Scarce,
}

/// Result of the local node capability probe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeCapability {
    /// The probe passed its health checks.
    pub healthy: bool,
    /// Declared hardware class.
    pub tier: CapacityTier,
    /// Storage-only nodes never run applications.
    #[serde(default)]
    pub storage_only: bool,
    /// The node runs the restricted OS image.
    #[serde(default)]
    pub restricted_os: bool,
    /// CPU cores available to applications.
    pub cpu_cores: f64,
    /// Memory available to applications, in megabytes.
    pub ram_mb: u64,
    /// Storage available to applications, in gigabytes.
    pub hdd_gb: u64,
}

/// Where a node is, as reported by its geolocation lookup.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeGeo {
    /// Continent code, e.g. `EU`.
    pub continent: String,
    /// Country code, e.g. `CZ`.
    pub country: String,
    /// Optional region code.
    #[serde(default)]
    pub region: Option<String>,
}

impl NodeGeo {
    /// The `CONTINENT_COUNTRY[_REGION]` path matched by geolocation rules.
    pub fn path(&self) -> String {
        match &self.region {
            Some(region) => format!("{}_{}_{}", self.continent, self.country, region),
            None => format!("{}_{}", self.continent, self.country),
        }
    }
}

/// Sync status reported by the ledger daemon.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStatus {
    /// The daemon has caught up with the network.
    pub synced: bool,
    /// Current best height.
    pub height: Height,
}

/// Sync status reported by a peer about its own message store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerSyncStatus {
    /// The peer considers its view complete.
    pub synced: bool,
    /// The peer's ledger height.
    pub height: Height,
}

/// One row of the versioned price table, effective from `height`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PriceFork {
    /// Activation height of this row.
    pub height: Height,
    /// Price per CPU core.
    pub cpu: f64,
    /// Price per 100 MB of memory.
    pub ram: f64,
    /// Price per GB of storage.
    pub hdd: f64,
    /// Network minimum for any message.
    pub min_price: f64,
    /// Surcharge for static IP placement.
    #[serde(default)]
    pub static_ip: f64,
    /// Surcharge for enterprise apps.
    #[serde(default)]
    pub enterprise: f64,
}
