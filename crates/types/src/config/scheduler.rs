// Path: crates/types/src/config/scheduler.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A randomised deferral window, in hours.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct DeferWindow {
    /// Lower bound.
    pub min_hours: f64,
    /// Upper bound.
    pub max_hours: f64,
}

impl DeferWindow {
    const fn hours(min_hours: f64, max_hours: f64) -> Self {
        Self {
            min_hours,
            max_hours,
        }
    }

    /// True when the window is empty and candidates are never deferred.
    pub fn is_disabled(&self) -> bool {
        self.max_hours <= 0.0
    }
}

/// Settings for the placement scheduler loop.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Replica target for specifications that do not set `instances`.
    #[serde(default = "default_required_replicas")]
    pub default_required_replicas: u32,
    /// Delay before rechecking failed preconditions.
    #[serde(default = "default_precondition_retry_secs")]
    pub precondition_retry_secs: u64,
    /// Quiet period after the node regains network confirmation.
    #[serde(default = "default_quiescent_after_rejoin_secs")]
    pub quiescent_after_rejoin_secs: u64,
    /// Wait after announcing before ranking competitors.
    #[serde(default = "default_announce_settle_secs")]
    pub announce_settle_secs: u64,
    /// Delay after losing the ranking.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Wait after a successful install before checking for over-replication.
    #[serde(default = "default_post_install_settle_secs")]
    pub post_install_settle_secs: u64,
    /// Delay when nothing needs placement.
    #[serde(default = "default_idle_delay_secs")]
    pub idle_delay_secs: u64,
    /// Delay between productive iterations.
    #[serde(default = "default_next_iteration_delay_secs")]
    pub next_iteration_delay_secs: u64,
    /// How long an app that failed compliance is skipped.
    #[serde(default = "default_negative_ttl_secs")]
    pub negative_ttl_secs: u64,
    /// How long an app recently attempted by this node is skipped.
    #[serde(default = "default_recent_attempt_ttl_secs")]
    pub recent_attempt_ttl_secs: u64,
    /// Deferral window for common-tier nodes.
    #[serde(default = "default_defer_window_common")]
    pub defer_window_common: DeferWindow,
    /// Deferral window for scarce-tier nodes.
    #[serde(default = "default_defer_window_scarce")]
    pub defer_window_scarce: DeferWindow,
    /// Deferral window for enterprise apps.
    #[serde(default = "default_defer_window_enterprise")]
    pub defer_window_enterprise: DeferWindow,
    /// Deferral window for data-replicating apps.
    #[serde(default = "default_defer_window_syncthing")]
    pub defer_window_syncthing: DeferWindow,
    /// Capacity of each negative cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_required_replicas() -> u32 {
    3
}
fn default_precondition_retry_secs() -> u64 {
    5 * 60
}
fn default_quiescent_after_rejoin_secs() -> u64 {
    125 * 60
}
fn default_announce_settle_secs() -> u64 {
    30
}
fn default_backoff_secs() -> u64 {
    5 * 60
}
fn default_post_install_settle_secs() -> u64 {
    60
}
fn default_idle_delay_secs() -> u64 {
    30 * 60
}
fn default_next_iteration_delay_secs() -> u64 {
    60
}
fn default_negative_ttl_secs() -> u64 {
    12 * 60 * 60
}
fn default_recent_attempt_ttl_secs() -> u64 {
    30 * 60
}
fn default_defer_window_common() -> DeferWindow {
    DeferWindow::hours(1.0, 2.0)
}
fn default_defer_window_scarce() -> DeferWindow {
    DeferWindow::hours(0.2, 0.5)
}
fn default_defer_window_enterprise() -> DeferWindow {
    DeferWindow::hours(0.5, 1.0)
}
fn default_defer_window_syncthing() -> DeferWindow {
    DeferWindow::hours(0.5, 2.0)
}
fn default_cache_capacity() -> usize {
    1_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_required_replicas: default_required_replicas(),
            precondition_retry_secs: default_precondition_retry_secs(),
            quiescent_after_rejoin_secs: default_quiescent_after_rejoin_secs(),
            announce_settle_secs: default_announce_settle_secs(),
            backoff_secs: default_backoff_secs(),
            post_install_settle_secs: default_post_install_settle_secs(),
            idle_delay_secs: default_idle_delay_secs(),
            next_iteration_delay_secs: default_next_iteration_delay_secs(),
            negative_ttl_secs: default_negative_ttl_secs(),
            recent_attempt_ttl_secs: default_recent_attempt_ttl_secs(),
            defer_window_common: default_defer_window_common(),
            defer_window_scarce: default_defer_window_scarce(),
            defer_window_enterprise: default_defer_window_enterprise(),
            defer_window_syncthing: default_defer_window_syncthing(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Delay before rechecking failed preconditions.
    pub fn precondition_retry(&self) -> Duration {
        Duration::from_secs(self.precondition_retry_secs)
    }
    /// Wait after announcing before ranking competitors.
    pub fn announce_settle(&self) -> Duration {
        Duration::from_secs(self.announce_settle_secs)
    }
    /// Delay after losing the ranking.
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
    /// Wait after a successful install.
    pub fn post_install_settle(&self) -> Duration {
        Duration::from_secs(self.post_install_settle_secs)
    }
    /// Delay when nothing needs placement.
    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.idle_delay_secs)
    }
    /// Delay between productive iterations.
    pub fn next_iteration_delay(&self) -> Duration {
        Duration::from_secs(self.next_iteration_delay_secs)
    }
}

/// Local rules that decide whether this node may run an application.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ComplianceConfig {
    /// Public ports this node refuses to expose.
    #[serde(default)]
    pub blocked_ports: Vec<u16>,
    /// Image prefixes allowed. Empty allows every image not blocked.
    #[serde(default)]
    pub allowed_repositories: Vec<String>,
    /// Image prefixes refused.
    #[serde(default)]
    pub blocked_repositories: Vec<String>,
}
