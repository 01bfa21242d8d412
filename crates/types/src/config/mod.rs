// Path: crates/types/src/config/mod.rs

//! Shared configuration structures for the fleet node.
//!
//! Every field carries a serde default so that an empty `fleet.toml` is a
//! valid configuration. Durations are expressed in whole seconds (`*_secs`)
//! or milliseconds (`*_ms`) and exposed as [`Duration`] through accessors.
use crate::app::PriceFork;
use crate::error::ConfigError;
use crate::Height;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduler tuning, compliance rules and deferral windows.
pub mod scheduler;
pub use scheduler::*;

/// Top-level node configuration, as loaded from `fleet.toml`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct NodeConfig {
    /// Message sync engine settings.
    pub sync: SyncConfig,
    /// Registry projector and location book settings.
    pub registry: RegistryConfig,
    /// Placement scheduler settings.
    pub scheduler: SchedulerConfig,
    /// Price table and fee parameters.
    pub pricing: PricingConfig,
    /// Local compliance rules applied before installing.
    pub compliance: ComplianceConfig,
    /// Logging and metrics endpoint.
    pub telemetry: TelemetryConfig,
    /// Document store backend.
    pub storage: StorageConfig,
    /// Admin listener, peers and local daemon endpoints.
    pub network: NetworkConfig,
}

impl NodeConfig {
    /// Rejects values the engines cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.max_resolve_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_resolve_attempts must be at least 1".into(),
            ));
        }
        if self.sync.sweep_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "sync.sweep_batch_size must be at least 1".into(),
            ));
        }
        if self.sync.sweep_interval_secs == 0
            || self.sync.reconcile_interval_secs == 0
            || self.sync.purge_interval_secs == 0
            || self.registry.expiry_interval_secs == 0
        {
            return Err(ConfigError::Invalid("task intervals must be positive".into()));
        }
        if self.sync.attempt_step == 0 {
            return Err(ConfigError::Invalid("sync.attempt_step must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.sync.bulk_recovery_threshold) {
            return Err(ConfigError::Invalid(format!(
                "sync.bulk_recovery_threshold must be within [0, 1], got {}",
                self.sync.bulk_recovery_threshold
            )));
        }
        if self.registry.storage_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "registry.storage_retry_attempts must be at least 1".into(),
            ));
        }
        if self.pricing.forks.is_empty() {
            return Err(ConfigError::Invalid("pricing.forks must not be empty".into()));
        }
        if self.pricing.free_instances == 0 || self.pricing.units_per_coin == 0 {
            return Err(ConfigError::Invalid(
                "pricing.free_instances and pricing.units_per_coin must be positive".into(),
            ));
        }
        if self.network.task_history == 0 {
            return Err(ConfigError::Invalid(
                "network.task_history must be at least 1".into(),
            ));
        }
        if self.scheduler.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "scheduler.cache_capacity must be at least 1".into(),
            ));
        }
        for (label, window) in [
            ("common", &self.scheduler.defer_window_common),
            ("scarce", &self.scheduler.defer_window_scarce),
            ("enterprise", &self.scheduler.defer_window_enterprise),
            ("syncthing", &self.scheduler.defer_window_syncthing),
        ] {
            if window.min_hours < 0.0 || window.min_hours > window.max_hours {
                return Err(ConfigError::Invalid(format!(
                    "scheduler.defer_window_{label} needs 0 <= min_hours <= max_hours"
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the message sync engine.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SyncConfig {
    /// Anchors below this height are ignored entirely.
    #[serde(default = "default_activation_height")]
    pub activation_height: Height,
    /// Delay between live resolve attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Live resolve attempts before leaving the hash to the sweep.
    #[serde(default = "default_max_resolve_attempts")]
    pub max_resolve_attempts: u32,
    /// Blocks per maturity step when seeding the sweep counter.
    #[serde(default = "default_blocks_lasting")]
    pub blocks_lasting: u64,
    /// Upper bound of the seeded sweep counter.
    #[serde(default = "default_max_maturity")]
    pub max_maturity: u32,
    /// Sweep counter increment per eligible pass.
    #[serde(default = "default_attempt_step")]
    pub attempt_step: u32,
    /// Sweep counter value at which a hash is declared not found.
    #[serde(default = "default_attempt_cap")]
    pub attempt_cap: u32,
    /// Hashes requested per sweep batch.
    #[serde(default = "default_sweep_batch_size")]
    pub sweep_batch_size: usize,
    /// Settle delay after each sweep batch.
    #[serde(default = "default_sweep_batch_delay_secs")]
    pub sweep_batch_delay_secs: u64,
    /// Missing fraction above which bulk recovery is used.
    #[serde(default = "default_bulk_recovery_threshold")]
    pub bulk_recovery_threshold: f64,
    /// Pause between replayed messages during bulk recovery.
    #[serde(default = "default_bulk_replay_pacing_ms")]
    pub bulk_replay_pacing_ms: u64,
    /// Peers tried during bulk recovery.
    #[serde(default = "default_bulk_recovery_peers")]
    pub bulk_recovery_peers: usize,
    /// Lifetime of an unanchored message.
    #[serde(default = "default_temporary_message_ttl_secs")]
    pub temporary_message_ttl_secs: u64,
    /// Timeout for single peer requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Timeout for full peer exports.
    #[serde(default = "default_export_timeout_secs")]
    pub export_timeout_secs: u64,
    /// Period of the background sweep over missing anchors.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Period of the hash record reconciliation.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    /// Period of the temporary message purge.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,
}

fn default_activation_height() -> Height {
    694_000
}
fn default_retry_delay_secs() -> u64 {
    60
}
fn default_max_resolve_attempts() -> u32 {
    3
}
fn default_blocks_lasting() -> u64 {
    4_320
}
fn default_max_maturity() -> u32 {
    16
}
fn default_attempt_step() -> u32 {
    2
}
fn default_attempt_cap() -> u32 {
    20
}
fn default_sweep_batch_size() -> usize {
    500
}
fn default_sweep_batch_delay_secs() -> u64 {
    120
}
fn default_bulk_recovery_threshold() -> f64 {
    0.95
}
fn default_bulk_replay_pacing_ms() -> u64 {
    50
}
fn default_bulk_recovery_peers() -> usize {
    5
}
fn default_temporary_message_ttl_secs() -> u64 {
    3_600
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_export_timeout_secs() -> u64 {
    600
}
fn default_sweep_interval_secs() -> u64 {
    10 * 60
}
fn default_reconcile_interval_secs() -> u64 {
    6 * 60 * 60
}
fn default_purge_interval_secs() -> u64 {
    5 * 60
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            activation_height: default_activation_height(),
            retry_delay_secs: default_retry_delay_secs(),
            max_resolve_attempts: default_max_resolve_attempts(),
            blocks_lasting: default_blocks_lasting(),
            max_maturity: default_max_maturity(),
            attempt_step: default_attempt_step(),
            attempt_cap: default_attempt_cap(),
            sweep_batch_size: default_sweep_batch_size(),
            sweep_batch_delay_secs: default_sweep_batch_delay_secs(),
            bulk_recovery_threshold: default_bulk_recovery_threshold(),
            bulk_replay_pacing_ms: default_bulk_replay_pacing_ms(),
            bulk_recovery_peers: default_bulk_recovery_peers(),
            temporary_message_ttl_secs: default_temporary_message_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            export_timeout_secs: default_export_timeout_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            purge_interval_secs: default_purge_interval_secs(),
        }
    }
}

impl SyncConfig {
    /// Delay between live resolve attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
    /// Settle delay after each sweep batch.
    pub fn sweep_batch_delay(&self) -> Duration {
        Duration::from_secs(self.sweep_batch_delay_secs)
    }
    /// Pause between replayed messages during bulk recovery.
    pub fn bulk_replay_pacing(&self) -> Duration {
        Duration::from_millis(self.bulk_replay_pacing_ms)
    }
    /// Lifetime of an unanchored message, in milliseconds.
    pub fn temporary_message_ttl_ms(&self) -> u64 {
        self.temporary_message_ttl_secs.saturating_mul(1_000)
    }
    /// Period of the background sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
    /// Period of the hash record reconciliation.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
    /// Period of the temporary message purge.
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

/// A height-gated entry of the default expiry allowance.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceFork {
    /// Height from which this allowance applies.
    pub from_height: Height,
    /// Lifetime in blocks for rows without an explicit `expire`.
    pub blocks: u64,
}

/// Settings for the registry projector and the location books.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegistryConfig {
    /// Expiry allowance schedule, selected by the current height.
    #[serde(default = "default_allowance_forks")]
    pub allowance_forks: Vec<AllowanceFork>,
    /// Delay between live-intake storage retries.
    #[serde(default = "default_storage_retry_delay_secs")]
    pub storage_retry_delay_secs: u64,
    /// Live-intake storage attempts before the failure is surfaced.
    #[serde(default = "default_storage_retry_attempts")]
    pub storage_retry_attempts: u32,
    /// Minimum gap between two local uninstalls triggered by expiry.
    #[serde(default = "default_removal_cooldown_secs")]
    pub removal_cooldown_secs: u64,
    /// Lifetime of a running-location claim.
    #[serde(default = "default_running_location_ttl_secs")]
    pub running_location_ttl_secs: u64,
    /// Lifetime of an installing announcement.
    #[serde(default = "default_installing_ttl_secs")]
    pub installing_ttl_secs: u64,
    /// Lifetime of an install error record.
    #[serde(default = "default_error_ttl_secs")]
    pub error_ttl_secs: u64,
    /// Period of the expiry pass.
    #[serde(default = "default_expiry_interval_secs")]
    pub expiry_interval_secs: u64,
}

/// Lifetime in blocks applied when no allowance fork covers a height.
pub const DEFAULT_ALLOWANCE_BLOCKS: u64 = 22_000;

fn default_allowance_forks() -> Vec<AllowanceFork> {
    vec![
        AllowanceFork {
            from_height: 0,
            blocks: DEFAULT_ALLOWANCE_BLOCKS,
        },
        AllowanceFork {
            from_height: 1_004_000,
            blocks: 88_000,
        },
    ]
}
fn default_storage_retry_delay_secs() -> u64 {
    60
}
fn default_storage_retry_attempts() -> u32 {
    5
}
fn default_removal_cooldown_secs() -> u64 {
    60
}
fn default_running_location_ttl_secs() -> u64 {
    125 * 60
}
fn default_installing_ttl_secs() -> u64 {
    5 * 60
}
fn default_error_ttl_secs() -> u64 {
    60 * 60
}
fn default_expiry_interval_secs() -> u64 {
    30 * 60
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            allowance_forks: default_allowance_forks(),
            storage_retry_delay_secs: default_storage_retry_delay_secs(),
            storage_retry_attempts: default_storage_retry_attempts(),
            removal_cooldown_secs: default_removal_cooldown_secs(),
            running_location_ttl_secs: default_running_location_ttl_secs(),
            installing_ttl_secs: default_installing_ttl_secs(),
            error_ttl_secs: default_error_ttl_secs(),
            expiry_interval_secs: default_expiry_interval_secs(),
        }
    }
}

impl RegistryConfig {
    /// The default lifetime in blocks for rows without `expire`, at `height`.
    pub fn allowance_at(&self, height: Height) -> u64 {
        self.allowance_forks
            .iter()
            .filter(|f| f.from_height <= height)
            .max_by_key(|f| f.from_height)
            .map_or(DEFAULT_ALLOWANCE_BLOCKS, |f| f.blocks)
    }
    /// Delay between live-intake storage retries.
    pub fn storage_retry_delay(&self) -> Duration {
        Duration::from_secs(self.storage_retry_delay_secs)
    }
    /// Minimum gap between two expiry-driven uninstalls.
    pub fn removal_cooldown(&self) -> Duration {
        Duration::from_secs(self.removal_cooldown_secs)
    }
    /// Lifetime of a running-location claim, in milliseconds.
    pub fn running_location_ttl_ms(&self) -> u64 {
        self.running_location_ttl_secs.saturating_mul(1_000)
    }
    /// Lifetime of an installing announcement, in milliseconds.
    pub fn installing_ttl_ms(&self) -> u64 {
        self.installing_ttl_secs.saturating_mul(1_000)
    }
    /// Lifetime of an install error record, in milliseconds.
    pub fn error_ttl_ms(&self) -> u64 {
        self.error_ttl_secs.saturating_mul(1_000)
    }
    /// Period of the expiry pass.
    pub fn expiry_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_interval_secs)
    }
}

/// Price table and fee parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PricingConfig {
    /// Lifetime in blocks that carries no price multiplier.
    #[serde(default = "default_expire")]
    pub default_expire: u64,
    /// Fee factor applied to update messages.
    #[serde(default = "default_update_fee_factor")]
    pub update_fee_factor: f64,
    /// Smallest ledger units per coin.
    #[serde(default = "default_units_per_coin")]
    pub units_per_coin: u64,
    /// Instances included in the base price.
    #[serde(default = "default_free_instances")]
    pub free_instances: u32,
    /// Price table rows, selected by the greatest height not above the message height.
    #[serde(default = "default_price_forks")]
    pub forks: Vec<PriceFork>,
}

fn default_expire() -> u64 {
    22_000
}
fn default_update_fee_factor() -> f64 {
    0.9
}
fn default_units_per_coin() -> u64 {
    100_000_000
}
fn default_free_instances() -> u32 {
    3
}
fn default_price_forks() -> Vec<PriceFork> {
    vec![
        PriceFork {
            height: 0,
            cpu: 3.0,
            ram: 1.0,
            hdd: 0.5,
            min_price: 1.0,
            static_ip: 0.0,
            enterprise: 0.0,
        },
        PriceFork {
            height: 1_004_000,
            cpu: 0.4,
            ram: 0.1,
            hdd: 0.05,
            min_price: 0.1,
            static_ip: 3.0,
            enterprise: 10.0,
        },
    ]
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            default_expire: default_expire(),
            update_fee_factor: default_update_fee_factor(),
            units_per_coin: default_units_per_coin(),
            free_instances: default_free_instances(),
            forks: default_price_forks(),
        }
    }
}

impl PricingConfig {
    /// The price table row effective at `height`.
    pub fn fork_at(&self, height: Height) -> Option<&PriceFork> {
        self.forks
            .iter()
            .filter(|f| f.height <= height)
            .max_by_key(|f| f.height)
    }
}

/// Logging and metrics endpoint settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Default log filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Address of the `/metrics` and `/healthz` server.
    #[serde(default = "default_telemetry_listen")]
    pub listen: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}
fn default_telemetry_listen() -> String {
    "127.0.0.1:9615".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            listen: default_telemetry_listen(),
        }
    }
}

/// Selects the document store backend.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile in-process store.
    Memory,
    /// Persistent `redb` file under the data directory.
    #[default]
    Redb,
}

/// Document store settings.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Backend to open.
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory holding the store file. Overridden by `--data-dir`.
    #[serde(default)]
    pub data_dir: Option<String>,
}

/// Where the node listens and which local daemons it talks to.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Address of the admin and peer HTTP surface. Overridden by `--admin-listen`.
    #[serde(default = "default_admin_listen")]
    pub admin_listen: String,
    /// Base URLs of peer nodes.
    #[serde(default)]
    pub peers: Vec<String>,
    /// Base URL of the local daemon serving ledger, runtime and probe endpoints.
    #[serde(default = "default_daemon_url")]
    pub daemon_url: String,
    /// Admin task records kept for `/admin/tasks/:id`; the oldest are dropped first.
    #[serde(default = "default_task_history")]
    pub task_history: usize,
}

fn default_admin_listen() -> String {
    "0.0.0.0:16127".to_string()
}
fn default_daemon_url() -> String {
    "http://127.0.0.1:16124".to_string()
}
fn default_task_history() -> usize {
    256
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            admin_listen: default_admin_listen(),
            peers: Vec::new(),
            daemon_url: default_daemon_url(),
            task_history: default_task_history(),
        }
    }
}
