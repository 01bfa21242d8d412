// Path: crates/types/src/app/spec.rs
use super::same_host;
use crate::Height;
use serde::{Deserialize, Serialize};

/// Container data flag marking a component whose volume is replicated
/// between instances by a peer-to-peer file sync sidecar.
pub const DATA_REPLICATION_FLAG: &str = "g:";

/// One container of a composed application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSpec {
    /// Component name, unique within the application.
    pub name: String,
    /// Image reference, e.g. `registry/repo:tag`.
    pub repotag: String,
    /// Public ports exposed on the node.
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Ports inside the container.
    #[serde(default)]
    pub container_ports: Vec<u16>,
    /// Custom domains routed to the public ports.
    #[serde(default)]
    pub domains: Vec<String>,
    /// Container data mount and flags.
    #[serde(default)]
    pub container_data: String,
    /// CPU cores.
    #[serde(default)]
    pub cpu: f64,
    /// Memory in megabytes.
    #[serde(default)]
    pub ram: u64,
    /// Storage in gigabytes.
    #[serde(default)]
    pub hdd: u64,
}

/// A registry row: the current specification of one application.
///
/// Specifications with `version <= 3` describe a single container with the
/// resource fields at the top level; later versions carry a `compose` list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppSpecification {
    /// Specification schema version.
    pub version: u32,
    /// Unique application name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Owner identity.
    #[serde(default)]
    pub owner: String,
    /// Containers of a composed application.
    #[serde(default)]
    pub compose: Vec<ComponentSpec>,
    /// Target replica count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instances: Option<u32>,
    /// Lifetime in blocks counted from `height`. `Some(0)` marks a permanent,
    /// local-only app. `None` means the network allowance applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire: Option<u64>,
    /// Node allow-list. Empty means any node.
    #[serde(default)]
    pub nodes: Vec<String>,
    /// Geolocation allow (`ac...`) and deny (`a!c...`) rules.
    #[serde(default)]
    pub geolocation: Vec<String>,
    /// Requests a static IP node.
    #[serde(default)]
    pub staticip: bool,
    /// Enterprise payload. Non-empty marks an enterprise app.
    #[serde(default)]
    pub enterprise: String,
    /// Only runnable on nodes running the restricted OS image.
    #[serde(default)]
    pub restricted_os_only: bool,
    /// Legacy single-container image reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repotag: Option<String>,
    /// Legacy single-container public ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<u16>,
    /// Legacy single-container internal ports.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub container_ports: Vec<u16>,
    /// Legacy single-container data mount.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_data: String,
    /// Legacy single-container CPU cores.
    #[serde(default, skip_serializing_if = "is_zero_f64")]
    pub cpu: f64,
    /// Legacy single-container memory in megabytes.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub ram: u64,
    /// Legacy single-container storage in gigabytes.
    #[serde(default, skip_serializing_if = "is_zero_u64")]
    pub hdd: u64,
    /// Anchor height of the message this row was projected from.
    #[serde(default)]
    pub height: Height,
    /// Hash of the message this row was projected from.
    #[serde(default)]
    pub hash: String,
}

fn is_zero_f64(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_u64(v: &u64) -> bool {
    *v == 0
}

impl AppSpecification {
    /// Replica count, falling back to the network default when unspecified.
    pub fn required_replicas(&self, default: u32) -> u32 {
        self.instances.unwrap_or(default)
    }

    /// True for enterprise apps.
    pub fn is_enterprise(&self) -> bool {
        !self.enterprise.is_empty()
    }

    /// True when `expire == 0`: exempt from expiry.
    pub fn is_permanent(&self) -> bool {
        self.expire == Some(0)
    }

    /// True if the allow-list names this node.
    pub fn targets(&self, address: &str) -> bool {
        self.nodes.iter().any(|n| same_host(n, address))
    }

    /// The containers of this application, normalising legacy single-container specs.
    pub fn components(&self) -> Vec<ComponentSpec> {
        if !self.compose.is_empty() || self.version > 3 {
            return self.compose.clone();
        }
        vec![ComponentSpec {
            name: self.name.clone(),
            repotag: self.repotag.clone().unwrap_or_default(),
            ports: self.ports.clone(),
            container_ports: self.container_ports.clone(),
            domains: Vec::new(),
            container_data: self.container_data.clone(),
            cpu: self.cpu,
            ram: self.ram,
            hdd: self.hdd,
        }]
    }

    /// All public ports across components.
    pub fn public_ports(&self) -> Vec<u16> {
        self.components()
            .iter()
            .flat_map(|c| c.ports.iter().copied())
            .collect()
    }

    /// True if any component replicates its data volume between instances.
    pub fn is_data_replicating(&self) -> bool {
        self.components()
            .iter()
            .any(|c| c.container_data.contains(DATA_REPLICATION_FLAG))
    }

    /// Summed CPU, memory (MB) and storage (GB) of one instance.
    pub fn resources(&self) -> (f64, u64, u64) {
        self.components()
            .iter()
            .fold((0.0, 0, 0), |(cpu, ram, hdd), c| {
                (cpu + c.cpu, ram + c.ram, hdd + c.hdd)
            })
    }
}
