// Path: crates/sync/src/engine.rs
use crate::price_gate::{PreviousSpec, PriceGate};
use fleet_api::clock::Clock;
use fleet_api::ledger::Ledger;
use fleet_api::pricing::{Pricing, SpecValidator};
use fleet_api::progress::SyncProgress;
use fleet_api::sink::RegistrySink;
use fleet_api::transport::Transport;
use fleet_storage::Collections;
use fleet_telemetry::{error_metrics, sync_metrics};
use fleet_types::app::{
    Anchor, AppMessage, GossipMessage, HashRecord, PeerSyncStatus, StoredMessage,
    TemporaryMessage,
};
use fleet_types::config::{PricingConfig, SyncConfig};
use fleet_types::error::{ErrorCode, SyncError, TransportError};
use fleet_types::hashing::verify_hash;
use fleet_types::TimestampMs;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Collaborators injected into a [`MessageSyncEngine`].
#[derive(Clone)]
pub struct SyncContext {
    /// Typed document store.
    pub collections: Collections,
    /// Gossip transport.
    pub transport: Arc<dyn Transport>,
    /// Resource pricing model.
    pub pricing: Arc<dyn Pricing>,
    /// Specification validator.
    pub validator: Arc<dyn SpecValidator>,
    /// Ledger daemon.
    pub ledger: Arc<dyn Ledger>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Receiver of accepted messages.
    pub sink: Arc<dyn RegistrySink>,
    /// Shared catch-up flag.
    pub progress: Arc<SyncProgress>,
}

/// What happened to a message received over gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeOutcome {
    /// Stored in the temporary cache and re-broadcast.
    Stored,
    /// Already held.
    Duplicate,
    /// The digest did not match.
    InvalidHash,
    /// The specification failed validation.
    Invalid,
}

/// Result of folding a message into permanent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Promotion {
    Accepted,
    Underpaid,
    Rejected,
    Discarded,
}

/// Ensures the node eventually holds the message behind every anchor.
pub struct MessageSyncEngine {
    pub(crate) config: SyncConfig,
    pub(crate) pricing_config: PricingConfig,
    pub(crate) ctx: SyncContext,
    /// Sweep attempt counters, keyed by hash.
    pub(crate) attempts: Mutex<HashMap<String, u32>>,
}

impl MessageSyncEngine {
    /// Builds an engine over its collaborators.
    pub fn new(config: SyncConfig, pricing_config: PricingConfig, ctx: SyncContext) -> Self {
        Self {
            config,
            pricing_config,
            ctx,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Typed store access.
    pub fn collections(&self) -> &Collections {
        &self.ctx.collections
    }

    /// Shared catch-up flag.
    pub fn progress(&self) -> &Arc<SyncProgress> {
        &self.ctx.progress
    }

    pub(crate) fn now(&self) -> TimestampMs {
        self.ctx.clock.now_ms()
    }

    pub(crate) fn fresh_since(&self) -> TimestampMs {
        self.now()
            .saturating_sub(self.config.temporary_message_ttl_ms())
    }

    pub(crate) async fn with_timeout<T>(
        limit: Duration,
        fut: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::Timeout)?
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// This node's own view of its message sync, served to peers.
    ///
    /// Anchors below the activation height and anchors the sweep gave up on
    /// can never be resolved, so they do not hold the view back.
    pub async fn self_status(&self) -> Result<PeerSyncStatus, SyncError> {
        let ledger = self.ctx.ledger.sync_status().await?;
        let outstanding = self
            .collections()
            .outstanding_hash_records(self.config.activation_height)?;
        Ok(PeerSyncStatus {
            synced: ledger.synced
                && self.ctx.progress.is_initial_recovery_done()
                && outstanding == 0,
            height: ledger.height,
        })
    }

    /// Records a newly reported anchor and tries to resolve it.
    pub async fn record_anchor(&self, anchor: Anchor) -> Result<bool, SyncError> {
        let inserted = self
            .collections()
            .insert_hash_record(&HashRecord::new(anchor.clone()))?;
        if !inserted {
            if let Some(existing) = self.collections().hash_record(&anchor.hash)? {
                if existing.has_message {
                    return Ok(true);
                }
            }
        }
        self.resolve(&anchor).await
    }

    /// Ensures the message behind `anchor` is held.
    ///
    /// Returns true once the message is held and was accepted, stored as
    /// underpaid, or definitively rejected. Returns false without any I/O for
    /// anchors below the activation height, and false after the bounded live
    /// retry gives up; the periodic sweep picks those up later.
    pub async fn resolve(&self, anchor: &Anchor) -> Result<bool, SyncError> {
        if anchor.height < self.config.activation_height {
            tracing::trace!(target: "sync", hash = %anchor.hash, height = anchor.height, "anchor predates activation");
            return Ok(false);
        }
        let attempts = self.config.max_resolve_attempts.max(1);
        for attempt in 0..attempts {
            if self.collections().has_permanent(&anchor.hash)? {
                self.collections().set_has_message(&anchor.hash, true)?;
                return Ok(true);
            }
            if let Some(temp) = self
                .collections()
                .temporary_message(&anchor.hash, self.fresh_since())?
            {
                if self.promote(temp.message, anchor).await? != Promotion::Discarded {
                    return Ok(true);
                }
            } else {
                sync_metrics().inc_peer_requests(1);
                let fetched = Self::with_timeout(
                    self.request_timeout(),
                    self.ctx.transport.request(&anchor.hash),
                )
                .await;
                match fetched {
                    Ok(Some(message)) if message.hash == anchor.hash => {
                        if self.promote(message, anchor).await? != Promotion::Discarded {
                            return Ok(true);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(target: "sync", hash = %anchor.hash, error = %e, "peer request failed");
                    }
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }
        tracing::debug!(target: "sync", hash = %anchor.hash, "message not found, leaving to sweep");
        Ok(false)
    }

    /// Moves a message into permanent storage if it passes every check.
    pub(crate) async fn promote(
        &self,
        message: AppMessage,
        anchor: &Anchor,
    ) -> Result<Promotion, SyncError> {
        let hash = anchor.hash.clone();
        if message.hash != hash || !verify_hash(&message) {
            tracing::warn!(target: "sync", hash = %hash, "dropping message with invalid hash");
            self.collections().remove_temporary(&hash)?;
            return Ok(Promotion::Discarded);
        }
        let message = message.anchored(anchor);
        let spec = match message.spec() {
            Ok(spec) => spec,
            Err(e) => return self.reject(&hash, SyncError::InvalidSpec(e.to_string())),
        };
        if let Err(e) = self.ctx.validator.verify(&spec, message.height).await {
            return self.reject(&hash, e);
        }

        let previous = self
            .collections()
            .previous_accepted(&spec.name, message.height)?;
        let previous_spec = match &previous {
            Some(p) => p.spec().ok().map(|s| (s, p.height)),
            None => None,
        };
        let gate = PriceGate::new(&self.pricing_config, self.ctx.pricing.as_ref());
        let verdict = gate.check(
            &message,
            &spec,
            previous_spec
                .as_ref()
                .map(|(spec, height)| PreviousSpec { spec, height: *height }),
        );
        let underpaid = match verdict {
            Ok(()) => false,
            Err(e @ SyncError::Underpaid { .. }) => {
                tracing::info!(target: "sync", name = %spec.name, hash = %hash, error = %e, "underpaid message retained but not projected");
                true
            }
            Err(e) => return Err(e),
        };

        let stored = StoredMessage {
            message: message.clone(),
            underpaid,
        };
        let first_time = self.collections().store_permanent(&stored)?;
        self.collections().set_has_message(&hash, true)?;
        self.collections().remove_temporary(&hash)?;
        self.attempts.lock().remove(&hash);

        if underpaid {
            sync_metrics().inc_resolved("underpaid");
            return Ok(Promotion::Underpaid);
        }
        sync_metrics().inc_resolved("accepted");
        if first_time {
            tracing::info!(target: "sync", name = %spec.name, hash = %hash, height = message.height, "message accepted");
            if let Err(e) = self.ctx.sink.apply_live(&message).await {
                error_metrics().inc_error("registry", e.code());
                tracing::error!(target: "sync", name = %spec.name, hash = %hash, error = %e, "live projection failed; the message stays stored for the next rebuild");
            }
        }
        Ok(Promotion::Accepted)
    }

    fn reject(&self, hash: &str, e: SyncError) -> Result<Promotion, SyncError> {
        tracing::warn!(target: "sync", hash = %hash, error = %e, "rejecting invalid message");
        error_metrics().inc_error("sync", e.code());
        sync_metrics().inc_resolved("rejected");
        self.collections().mark_not_found(hash)?;
        self.collections().remove_temporary(hash)?;
        self.attempts.lock().remove(hash);
        Ok(Promotion::Rejected)
    }

    /// Stores a gossiped, not yet anchored message and re-broadcasts it once.
    ///
    /// If its anchor is already known the message is resolved right away.
    pub async fn intake_temporary(&self, message: AppMessage) -> Result<IntakeOutcome, SyncError> {
        if !verify_hash(&message) {
            tracing::warn!(target: "sync", hash = %message.hash, "dropping gossiped message with invalid hash");
            return Ok(IntakeOutcome::InvalidHash);
        }
        let hash = message.hash.clone();
        if self.collections().has_permanent(&hash)?
            || self
                .collections()
                .temporary_message(&hash, self.fresh_since())?
                .is_some()
        {
            return Ok(IntakeOutcome::Duplicate);
        }
        let spec = match message.spec() {
            Ok(spec) => spec,
            Err(e) => {
                tracing::warn!(target: "sync", hash = %hash, error = %e, "gossiped message has a malformed specification");
                return Ok(IntakeOutcome::Invalid);
            }
        };
        let height = self.ctx.ledger.sync_status().await?.height;
        if let Err(e) = self.ctx.validator.verify(&spec, height).await {
            tracing::warn!(target: "sync", hash = %hash, error = %e, "gossiped message failed validation");
            return Ok(IntakeOutcome::Invalid);
        }

        self.collections().store_temporary(&TemporaryMessage {
            message: message.clone(),
            received_at: self.now(),
        })?;
        sync_metrics().inc_temporary_received();
        if let Err(e) = self
            .ctx
            .transport
            .broadcast(GossipMessage::AppMessage(message.clone()))
            .await
        {
            tracing::debug!(target: "sync", hash = %hash, error = %e, "re-broadcast failed");
        }

        if let Some(record) = self.collections().hash_record(&hash)? {
            if !record.has_message && record.height >= self.config.activation_height {
                self.promote(message, &record.anchor()).await?;
            }
        }
        Ok(IntakeOutcome::Stored)
    }

    /// Deletes temporary messages older than their lifetime.
    pub fn purge_temporary(&self) -> Result<usize, SyncError> {
        let removed = self.collections().purge_temporary(self.fresh_since())?;
        if removed > 0 {
            tracing::debug!(target: "sync", removed, "purged stale temporary messages");
        }
        Ok(removed)
    }
}
