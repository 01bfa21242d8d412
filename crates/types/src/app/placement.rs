// Path: crates/types/src/app/placement.rs
use super::{AppMessage, AppSpecification};
use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// A gossiped claim that a node is running a replica of an application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Application name.
    pub name: String,
    /// Hash of the specification the replica runs.
    pub hash: String,
    /// Address of the node running it.
    pub ip: String,
    /// When the claim was broadcast.
    pub broadcasted_at: TimestampMs,
    /// When the claim stops counting unless refreshed.
    #[serde(default)]
    pub expire_at: TimestampMs,
    /// When the replica started on that node.
    pub running_since: TimestampMs,
}

/// A node's public claim that it is installing a replica right now.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallingAnnouncement {
    /// Application name.
    pub name: String,
    /// Address of the announcing node.
    pub ip: String,
    /// When the announcement was broadcast. Used for ranking.
    pub broadcasted_at: TimestampMs,
    /// Local expiry of the stored announcement.
    #[serde(default)]
    pub expire_at: TimestampMs,
}

/// A gossiped record of a failed install attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallErrorRecord {
    /// Application name.
    pub name: String,
    /// Hash of the specification that failed.
    pub hash: String,
    /// Address of the node that failed.
    pub ip: String,
    /// Human readable failure.
    pub error: String,
    /// When the failure was broadcast.
    pub broadcasted_at: TimestampMs,
    /// Local expiry of the stored record.
    #[serde(default)]
    pub expire_at: TimestampMs,
}

/// A gossiped notice that a node stopped running an application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemovedNotice {
    /// Application name.
    pub name: String,
    /// Address of the node that removed it.
    pub ip: String,
    /// When the notice was broadcast.
    pub broadcasted_at: TimestampMs,
}

/// Every payload carried by the gossip transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum GossipMessage {
    /// An unanchored (temporary) application message.
    AppMessage(AppMessage),
    /// A running-replica claim.
    AppRunning(LocationRecord),
    /// An installing announcement.
    AppInstalling(InstallingAnnouncement),
    /// An install failure.
    AppInstallError(InstallErrorRecord),
    /// A removal notice.
    AppRemoved(RemovedNotice),
}

impl GossipMessage {
    /// A stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AppMessage(_) => "app_message",
            Self::AppRunning(_) => "app_running",
            Self::AppInstalling(_) => "app_installing",
            Self::AppInstallError(_) => "app_install_error",
            Self::AppRemoved(_) => "app_removed",
        }
    }
}

/// An under-replicated application, computed per scheduler iteration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlacementCandidate {
    /// Application name.
    pub name: String,
    /// Current specification hash.
    pub hash: String,
    /// Replicas currently reported running.
    pub actual_replicas: u32,
    /// Replicas the owner asked for.
    pub required_replicas: u32,
    /// Node allow-list.
    pub node_allow_list: Vec<String>,
    /// Geolocation rules.
    pub geolocation: Vec<String>,
    /// Enterprise app.
    pub enterprise: bool,
    /// Data-replicating app, scheduled through its own deferred queue.
    pub data_replicating: bool,
}

impl PlacementCandidate {
    /// Builds a candidate from a registry row and its running count.
    pub fn from_spec(spec: &AppSpecification, actual: u32, default_required: u32) -> Self {
        Self {
            name: spec.name.clone(),
            hash: spec.hash.clone(),
            actual_replicas: actual,
            required_replicas: spec.required_replicas(default_required),
            node_allow_list: spec.nodes.clone(),
            geolocation: spec.geolocation.clone(),
            enterprise: spec.is_enterprise(),
            data_replicating: spec.is_data_replicating(),
        }
    }

    /// True while fewer replicas run than required.
    pub fn is_deficient(&self) -> bool {
        self.actual_replicas < self.required_replicas
    }
}

/// A candidate deliberately skipped this round, to be revisited later.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeferredCheck {
    /// Application name.
    pub app_name: String,
    /// Specification hash at deferral time.
    pub hash: String,
    /// Required replicas at deferral time.
    pub required_replicas: u32,
    /// Earliest time the check may run.
    pub not_before: TimestampMs,
}

/// An application installed on this node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocalApp {
    /// The specification the local instance runs.
    pub spec: AppSpecification,
    /// When the instance was installed.
    pub installed_at: TimestampMs,
}
