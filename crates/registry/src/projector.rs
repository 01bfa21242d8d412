// Path: crates/registry/src/projector.rs
use async_trait::async_trait;
use fleet_api::ledger::Ledger;
use fleet_api::node::ContainerRuntime;
use fleet_api::sink::RegistrySink;
use fleet_storage::Collections;
use fleet_telemetry::{error_metrics, registry_metrics};
use fleet_types::app::{AppMessage, AppSpecification};
use fleet_types::config::RegistryConfig;
use fleet_types::error::{ErrorCode, RegistryError};
use fleet_types::Height;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

/// Summary of a rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    /// Accepted messages replayed.
    pub replayed: usize,
    /// Messages that changed a row.
    pub projected: usize,
    /// Messages skipped because their specification did not decode.
    pub malformed: usize,
    /// The expiry pass run at the end.
    pub expiry: ExpireReport,
}

/// Summary of an expiry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpireReport {
    /// Ledger height the pass ran at.
    pub height: Height,
    /// Registry rows deleted.
    pub expired: Vec<String>,
    /// Local replicas uninstalled.
    pub removed_locally: Vec<String>,
}

/// Projects accepted messages into the registry and expires lapsed rows.
pub struct RegistryProjector {
    config: RegistryConfig,
    collections: Collections,
    ledger: Arc<dyn Ledger>,
    runtime: Arc<dyn ContainerRuntime>,
    last_removal: Mutex<Option<Instant>>,
}

impl RegistryProjector {
    /// Creates a projector.
    pub fn new(
        config: RegistryConfig,
        collections: Collections,
        ledger: Arc<dyn Ledger>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Self {
        Self {
            config,
            collections,
            ledger,
            runtime,
            last_removal: Mutex::new(None),
        }
    }

    /// Typed store access.
    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    /// The registry row carried by an anchored message.
    pub fn row_of(message: &AppMessage) -> Result<AppSpecification, RegistryError> {
        let mut spec = message.spec().map_err(|e| RegistryError::MalformedSpec {
            hash: message.hash.clone(),
            reason: e.to_string(),
        })?;
        spec.height = message.height;
        spec.hash = message.hash.clone();
        Ok(spec)
    }

    /// Upserts `spec` if it is anchored higher than the stored row. Returns
    /// true if the row changed. Storage failures are returned as they are.
    pub fn apply_strict(&self, spec: &AppSpecification) -> Result<bool, RegistryError> {
        apply_newer(&self.collections, spec)
    }

    /// Projects a message received during live intake, waiting for the result.
    ///
    /// Storage failures are retried with a fixed delay up to
    /// `storage_retry_attempts` times, then surfaced as
    /// [`RegistryError::RetriesExhausted`]. The message itself stays in the
    /// permanent store, so the next rebuild still projects it.
    pub async fn apply_live(&self, message: &AppMessage) -> Result<bool, RegistryError> {
        let spec = Self::row_of(message)?;
        project_with_retries(&self.config, &self.collections, &spec, &message.hash, 1).await
    }

    /// Replays accepted messages from `from_height` upwards, then expires.
    ///
    /// With `purge`, rows at or above `from_height` (every row when it is 0)
    /// are deleted first. Any storage failure aborts the rebuild.
    pub async fn rebuild(
        &self,
        from_height: Height,
        purge: bool,
    ) -> Result<RebuildReport, RegistryError> {
        if purge {
            if from_height == 0 {
                self.collections.drop_registry()?;
            } else {
                let removed = self.collections.delete_registry_from(from_height)?;
                tracing::info!(target: "registry", from_height, removed, "purged registry rows");
            }
        }
        let messages = self.collections.accepted_messages(from_height)?;
        let mut report = RebuildReport {
            replayed: messages.len(),
            ..RebuildReport::default()
        };
        for message in &messages {
            let spec = match Self::row_of(message) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(target: "registry", hash = %message.hash, error = %e, "skipping message");
                    report.malformed += 1;
                    continue;
                }
            };
            if self.apply_strict(&spec)? {
                report.projected += 1;
                registry_metrics().inc_projected("rebuild");
            }
        }
        tracing::info!(target: "registry", from_height, purge, replayed = report.replayed, projected = report.projected, "registry rebuilt");
        report.expiry = self.expire().await?;
        Ok(report)
    }

    fn lifetime(&self, spec: &AppSpecification, height: Height) -> u64 {
        spec.expire
            .unwrap_or_else(|| self.config.allowance_at(height))
    }

    fn lapsed(&self, spec: &AppSpecification, height: Height) -> bool {
        !spec.is_permanent() && spec.height.saturating_add(self.lifetime(spec, height)) < height
    }

    /// Deletes rows whose lifetime has lapsed and uninstalls local replicas
    /// that lost their row or outlived their own lifetime.
    pub async fn expire(&self) -> Result<ExpireReport, RegistryError> {
        let height = self.ledger.sync_status().await?.height;
        let mut report = ExpireReport {
            height,
            ..ExpireReport::default()
        };
        for row in self.collections.registry_rows()? {
            if self.lapsed(&row, height) {
                self.collections.delete_registry(&row.name)?;
                self.collections.clear_install_errors(&row.name)?;
                tracing::info!(target: "registry", name = %row.name, height = row.height, "registry row expired");
                report.expired.push(row.name);
            }
        }
        registry_metrics().inc_expired(report.expired.len() as u64);
        registry_metrics().set_registry_size(self.collections.registry_count()? as u64);

        for local in self.runtime.installed().await? {
            let spec = &local.spec;
            if spec.is_permanent() {
                continue;
            }
            let orphaned = self.collections.registry_row(&spec.name)?.is_none();
            if !orphaned && !self.lapsed(spec, height) {
                continue;
            }
            self.cooldown().await;
            match self.runtime.remove(&spec.name).await {
                Ok(()) => {
                    registry_metrics().inc_local_removals();
                    tracing::info!(target: "registry", name = %spec.name, orphaned, "uninstalled expired local app");
                    report.removed_locally.push(spec.name.clone());
                }
                Err(e) => {
                    let e = RegistryError::from(e);
                    error_metrics().inc_error("registry", e.code());
                    tracing::warn!(target: "registry", name = %spec.name, error = %e, "failed to uninstall expired local app");
                }
            }
            *self.last_removal.lock() = Some(Instant::now());
        }
        Ok(report)
    }

    async fn cooldown(&self) {
        let last = *self.last_removal.lock();
        if let Some(last) = last {
            let until = last + self.config.removal_cooldown();
            if until > Instant::now() {
                tokio::time::sleep_until(until).await;
            }
        }
    }
}

fn apply_newer(collections: &Collections, spec: &AppSpecification) -> Result<bool, RegistryError> {
    if let Some(current) = collections.registry_row(&spec.name)? {
        if current.height >= spec.height {
            tracing::trace!(target: "registry", name = %spec.name, stored = current.height, incoming = spec.height, "keeping stored row");
            return Ok(false);
        }
    }
    collections.upsert_registry(spec)?;
    collections.clear_install_errors(&spec.name)?;
    tracing::debug!(target: "registry", name = %spec.name, height = spec.height, hash = %spec.hash, "registry row updated");
    Ok(true)
}

/// Runs attempts `first..=storage_retry_attempts`, sleeping before each retry.
async fn project_with_retries(
    config: &RegistryConfig,
    collections: &Collections,
    spec: &AppSpecification,
    hash: &str,
    first: u32,
) -> Result<bool, RegistryError> {
    let attempts = config.storage_retry_attempts.max(1);
    for attempt in first..=attempts {
        if attempt > 1 {
            tokio::time::sleep(config.storage_retry_delay()).await;
        }
        match apply_newer(collections, spec) {
            Ok(changed) => {
                registry_metrics().inc_projected("live");
                return Ok(changed);
            }
            Err(RegistryError::Store(e)) => {
                error_metrics().inc_error("registry", e.code());
                tracing::warn!(target: "registry", name = %spec.name, attempt, error = %e, "registry write failed");
            }
            Err(e) => return Err(e),
        }
    }
    registry_metrics().inc_live_retry_exhausted();
    tracing::error!(target: "registry", name = %spec.name, hash = %hash, attempts, "giving up on live projection");
    Err(RegistryError::RetriesExhausted {
        hash: hash.to_string(),
        attempts,
    })
}

/// The sync engine's view of the projector. The first write happens inline;
/// storage retries move to a detached task so promotion and sweeps keep going.
#[async_trait]
impl RegistrySink for RegistryProjector {
    async fn apply_live(&self, message: &AppMessage) -> Result<(), RegistryError> {
        let spec = Self::row_of(message)?;
        match apply_newer(&self.collections, &spec) {
            Ok(_) => {
                registry_metrics().inc_projected("live");
                Ok(())
            }
            Err(RegistryError::Store(e)) => {
                error_metrics().inc_error("registry", e.code());
                tracing::warn!(target: "registry", name = %spec.name, attempt = 1, error = %e, "registry write failed; retrying in the background");
                let config = self.config.clone();
                let collections = self.collections.clone();
                let hash = message.hash.clone();
                tokio::spawn(async move {
                    // Exhaustion is logged and counted inside.
                    let _ = project_with_retries(&config, &collections, &spec, &hash, 2).await;
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
