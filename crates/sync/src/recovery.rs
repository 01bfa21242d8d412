// Path: crates/sync/src/recovery.rs
use crate::engine::MessageSyncEngine;
use fleet_telemetry::sync_metrics;
use fleet_types::app::TemporaryMessage;
use fleet_types::error::SyncError;
use fleet_types::hashing::verify_hash;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::time::Duration;

/// Summary of a bulk recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// The peer whose export was replayed.
    pub peer: String,
    /// Messages in the export.
    pub exported: usize,
    /// Anchors resolved from the export.
    pub resolved: usize,
}

impl MessageSyncEngine {
    /// True when more than the configured fraction of anchors lack content.
    pub fn needs_bulk_recovery(&self) -> Result<bool, SyncError> {
        let (total, missing) = self.collections().hash_record_counts()?;
        if total == 0 {
            return Ok(false);
        }
        Ok(missing as f64 / total as f64 > self.config.bulk_recovery_threshold)
    }

    /// Replays a synced peer's full export, oldest message first.
    ///
    /// Up to `bulk_recovery_peers` random peers are tried; peers that are
    /// unreachable or report an unsynced view are skipped.
    pub async fn bulk_recover(&self) -> Result<BulkReport, SyncError> {
        let mut peers = self.ctx.transport.peers().await;
        {
            let mut rng = rand::thread_rng();
            peers.shuffle(&mut rng);
        }
        let export_timeout = Duration::from_secs(self.config.export_timeout_secs);
        for peer in peers.into_iter().take(self.config.bulk_recovery_peers) {
            match Self::with_timeout(self.request_timeout(), self.ctx.transport.peer_status(&peer))
                .await
            {
                Ok(status) if status.synced => {}
                Ok(_) => {
                    tracing::debug!(target: "sync", peer = %peer, "peer not synced, trying another");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(target: "sync", peer = %peer, error = %e, "peer unreachable, trying another");
                    continue;
                }
            }
            let mut messages = match Self::with_timeout(
                export_timeout,
                self.ctx.transport.fetch_permanent_messages(&peer),
            )
            .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(target: "sync", peer = %peer, error = %e, "export download failed, trying another peer");
                    continue;
                }
            };
            messages.sort_by_key(|m| (m.height, m.timestamp));
            tracing::info!(target: "sync", peer = %peer, count = messages.len(), "replaying peer export");

            let exported = messages.len();
            let mut resolved = 0;
            for message in messages {
                let Some(record) = self.collections().hash_record(&message.hash)? else {
                    continue;
                };
                if record.has_message || !verify_hash(&message) {
                    continue;
                }
                self.collections().store_temporary(&TemporaryMessage {
                    message,
                    received_at: self.now(),
                })?;
                if self.resolve(&record.anchor()).await? {
                    resolved += 1;
                }
                tokio::time::sleep(self.config.bulk_replay_pacing()).await;
            }
            self.ctx.progress.mark_initial_recovery_done();
            sync_metrics().inc_bulk_recoveries();
            tracing::info!(target: "sync", peer = %peer, exported, resolved, "bulk recovery finished");
            return Ok(BulkReport {
                peer,
                exported,
                resolved,
            });
        }
        Err(SyncError::NoSyncedPeer)
    }

    /// The first catch-up after start: bulk recovery when almost everything is
    /// missing, otherwise (or if no peer can serve an export) a sweep.
    pub async fn catch_up(&self) -> Result<(), SyncError> {
        if self.needs_bulk_recovery()? {
            match self.bulk_recover().await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    tracing::warn!(target: "sync", error = %e, "bulk recovery failed, falling back to sweep");
                }
            }
        }
        self.sweep_missing(false).await?;
        self.ctx.progress.mark_initial_recovery_done();
        Ok(())
    }

    /// Sets every record's `hasMessage` from the permanent store. Returns the
    /// number of records repaired.
    pub fn reconcile(&self) -> Result<usize, SyncError> {
        let mut repaired = 0;
        for record in self.collections().hash_records()? {
            let held = self.collections().has_permanent(&record.hash)?;
            if held != record.has_message {
                self.collections().set_has_message(&record.hash, held)?;
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::info!(target: "sync", repaired, "reconciled hash records");
        }
        Ok(repaired)
    }
}
