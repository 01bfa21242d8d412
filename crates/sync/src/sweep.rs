// Path: crates/sync/src/sweep.rs
use crate::engine::{MessageSyncEngine, Promotion};
use fleet_telemetry::sync_metrics;
use fleet_types::app::{HashRecord, TemporaryMessage};
use fleet_types::error::SyncError;
use fleet_types::hashing::verify_hash;
use fleet_types::Height;
use serde::Serialize;

/// Summary of one sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Anchors lacking content when the pass started.
    pub missing: usize,
    /// Anchors requested from peers.
    pub requested: usize,
    /// Anchors whose content was found and handled.
    pub resolved: usize,
    /// Anchors given up on during this pass.
    pub given_up: usize,
}

impl MessageSyncEngine {
    /// Seed value of the sweep counter: older anchors start closer to the cap
    /// and so get fewer attempts.
    pub fn maturity(&self, current: Height, anchored: Height) -> u32 {
        let lasting = self.config.blocks_lasting.max(1) as f64;
        let age = current.saturating_sub(anchored) as f64;
        let score = (age / lasting).round();
        (score as u32).min(self.config.max_maturity)
    }

    /// Advances attempt counters and returns the records to request now.
    fn eligible_for_sweep(
        &self,
        records: Vec<HashRecord>,
        current: Height,
        report: &mut SweepReport,
    ) -> Result<Vec<HashRecord>, SyncError> {
        let mut eligible = Vec::with_capacity(records.len());
        let mut attempts = self.attempts.lock();
        for record in records {
            if record.height < self.config.activation_height {
                continue;
            }
            let counter = attempts
                .entry(record.hash.clone())
                .or_insert_with(|| self.maturity(current, record.height));
            if *counter >= self.config.attempt_cap {
                attempts.remove(&record.hash);
                self.collections().mark_not_found(&record.hash)?;
                sync_metrics().inc_resolved("not_found");
                tracing::info!(target: "sync", hash = %record.hash, height = record.height, "giving up on missing message");
                report.given_up += 1;
                continue;
            }
            *counter += self.config.attempt_step;
            eligible.push(record);
        }
        Ok(eligible)
    }

    /// Requests every anchor whose content is still missing.
    ///
    /// Records already given up on are skipped unless `force` is set. Requests
    /// go out in batches with a settling delay between them, and whatever has
    /// arrived in the temporary cache is promoted after each batch.
    pub async fn sweep_missing(&self, force: bool) -> Result<SweepReport, SyncError> {
        let current = self.ctx.ledger.sync_status().await?.height;
        let records = self.collections().missing_hash_records(force)?;
        let mut report = SweepReport {
            missing: records.len(),
            ..SweepReport::default()
        };
        sync_metrics().set_missing_hashes(records.len() as u64);
        let eligible = self.eligible_for_sweep(records, current, &mut report)?;

        let batch = self.config.sweep_batch_size.max(1);
        let batches = eligible.chunks(batch).count();
        for (i, chunk) in eligible.chunks(batch).enumerate() {
            let hashes: Vec<String> = chunk.iter().map(|r| r.hash.clone()).collect();
            report.requested += hashes.len();
            sync_metrics().inc_peer_requests(hashes.len() as u64);
            tracing::debug!(target: "sync", batch = i, size = hashes.len(), "requesting missing messages");
            match Self::with_timeout(
                self.request_timeout(),
                self.ctx.transport.request_many(&hashes),
            )
            .await
            {
                Ok(messages) => {
                    let received_at = self.now();
                    for message in messages {
                        if hashes.contains(&message.hash) && verify_hash(&message) {
                            self.collections().store_temporary(&TemporaryMessage {
                                message,
                                received_at,
                            })?;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "sync", batch = i, error = %e, "batch request failed");
                }
            }
            if i + 1 < batches {
                tokio::time::sleep(self.config.sweep_batch_delay()).await;
            }
            report.resolved += self.promote_arrived(chunk).await?;
        }
        if report.missing > 0 {
            tracing::info!(target: "sync", missing = report.missing, requested = report.requested, resolved = report.resolved, given_up = report.given_up, "sweep finished");
        }
        Ok(report)
    }

    /// Promotes the records of `chunk` whose message reached the temporary cache.
    async fn promote_arrived(&self, chunk: &[HashRecord]) -> Result<usize, SyncError> {
        let hashes: Vec<String> = chunk.iter().map(|r| r.hash.clone()).collect();
        let arrived = self
            .collections()
            .temporary_messages_for(&hashes, self.fresh_since())?;
        let mut resolved = 0;
        for temp in arrived {
            let Some(record) = chunk.iter().find(|r| r.hash == temp.message.hash) else {
                continue;
            };
            if self.promote(temp.message, &record.anchor()).await? != Promotion::Discarded {
                resolved += 1;
            }
        }
        Ok(resolved)
    }
}
