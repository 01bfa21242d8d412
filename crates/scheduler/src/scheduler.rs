// Path: crates/scheduler/src/scheduler.rs
use crate::cache::TtlCache;
use crate::compliance;
use crate::deferred::DeferredQueue;
use crate::eligibility;
use crate::ranking;
use fleet_api::clock::Clock;
use fleet_api::ledger::Ledger;
use fleet_api::node::{ContainerRuntime, NodeProbe};
use fleet_api::progress::SyncProgress;
use fleet_api::transport::Transport;
use fleet_registry::LocationBook;
use fleet_storage::Collections;
use fleet_telemetry::time::TickTimer;
use fleet_telemetry::{error_metrics, scheduler_metrics};
use fleet_types::app::{
    same_host, AppSpecification, CapacityTier, DeferredCheck, GossipMessage, InstallErrorRecord,
    InstallingAnnouncement, LocalApp, LocationRecord, NodeCapability, NodeGeo, PlacementCandidate,
    RemovedNotice,
};
use fleet_types::config::{ComplianceConfig, DeferWindow, SchedulerConfig};
use fleet_types::error::{ErrorCode, SchedulerError};
use fleet_types::TimestampMs;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Collaborators injected into a [`PlacementScheduler`].
#[derive(Clone)]
pub struct SchedulerContext {
    /// Typed document store, for registry reads.
    pub collections: Collections,
    /// Running, installing and error books.
    pub locations: LocationBook,
    /// Gossip transport.
    pub transport: Arc<dyn Transport>,
    /// Ledger daemon.
    pub ledger: Arc<dyn Ledger>,
    /// Local container runtime.
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Local node probes.
    pub probe: Arc<dyn NodeProbe>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Set once the message store caught up after start.
    pub progress: Arc<SyncProgress>,
}

/// What one scheduler iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A precondition failed.
    NotReady(&'static str),
    /// The node was confirmed again recently and waits for gossip to catch up.
    Quiescent,
    /// Nothing to do.
    Idle,
    /// The candidate was queued for a later attempt.
    Deferred {
        /// Application name.
        name: String,
        /// Earliest retry time.
        not_before: TimestampMs,
    },
    /// The candidate cannot run here.
    Ineligible {
        /// Application name.
        name: String,
        /// Short reason.
        reason: &'static str,
    },
    /// The deficit was gone by the time it was re-checked.
    Satisfied {
        /// Application name.
        name: String,
    },
    /// Other nodes announced earlier.
    BackedOff {
        /// Application name.
        name: String,
    },
    /// A replica was installed and kept.
    Installed {
        /// Application name.
        name: String,
    },
    /// The runtime failed to install.
    InstallFailed {
        /// Application name.
        name: String,
    },
    /// A replica was installed, then removed because the app was over-provisioned.
    SelfRemoved {
        /// Application name.
        name: String,
    },
}

impl TickOutcome {
    /// A stable label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NotReady(_) => "not_ready",
            Self::Quiescent => "quiescent",
            Self::Idle => "idle",
            Self::Deferred { .. } => "deferred",
            Self::Ineligible { .. } => "ineligible",
            Self::Satisfied { .. } => "satisfied",
            Self::BackedOff { .. } => "backed_off",
            Self::Installed { .. } => "installed",
            Self::InstallFailed { .. } => "install_failed",
            Self::SelfRemoved { .. } => "self_removed",
        }
    }
}

/// This node as seen by the probes at the start of an iteration.
struct NodeView {
    address: String,
    capability: NodeCapability,
    geo: Option<NodeGeo>,
}

enum Readiness {
    Ready(NodeView),
    Wait(TickOutcome),
}

/// The per-node placement loop and all the state it carries between iterations.
pub struct PlacementScheduler {
    config: SchedulerConfig,
    compliance: ComplianceConfig,
    ctx: SchedulerContext,
    negative: TtlCache,
    recent: TtlCache,
    deferred: DeferredQueue,
    deferred_syncthing: DeferredQueue,
    rng: StdRng,
    confirmed: Option<bool>,
    quiescent_until: Option<TimestampMs>,
}

impl PlacementScheduler {
    /// Creates a scheduler with an entropy-seeded random source.
    pub fn new(config: SchedulerConfig, compliance: ComplianceConfig, ctx: SchedulerContext) -> Self {
        Self::with_rng(config, compliance, ctx, StdRng::from_entropy())
    }

    /// Creates a scheduler with a fixed seed.
    pub fn with_seed(
        config: SchedulerConfig,
        compliance: ComplianceConfig,
        ctx: SchedulerContext,
        seed: u64,
    ) -> Self {
        Self::with_rng(config, compliance, ctx, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        config: SchedulerConfig,
        compliance: ComplianceConfig,
        ctx: SchedulerContext,
        rng: StdRng,
    ) -> Self {
        let negative = TtlCache::new(config.cache_capacity, ctx.clock.clone());
        let recent = TtlCache::new(config.cache_capacity, ctx.clock.clone());
        Self {
            config,
            compliance,
            ctx,
            negative,
            recent,
            deferred: DeferredQueue::new(),
            deferred_syncthing: DeferredQueue::new(),
            rng,
            confirmed: None,
            quiescent_until: None,
        }
    }

    fn now(&self) -> TimestampMs {
        self.ctx.clock.now_ms()
    }

    /// Number of entries waiting in the deferred queues.
    pub fn deferred_len(&self) -> usize {
        self.deferred.len() + self.deferred_syncthing.len()
    }

    /// Delay before the iteration following `outcome`.
    pub fn delay_after(&self, outcome: &TickOutcome) -> Duration {
        match outcome {
            TickOutcome::NotReady(_) | TickOutcome::Quiescent => self.config.precondition_retry(),
            TickOutcome::Idle => self.config.idle_delay(),
            TickOutcome::BackedOff { .. } => self.config.backoff(),
            _ => self.config.next_iteration_delay(),
        }
    }

    /// Runs iterations until `shutdown` flips to true. Errors never stop the loop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(target: "scheduler", "placement scheduler started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let timer = TickTimer::start(scheduler_metrics());
            let result = tokio::select! {
                result = self.tick() => Some(result),
                _ = shutdown.changed() => None,
            };
            let delay = match result {
                None if shutdown.has_changed().is_err() => break,
                None => continue,
                Some(Ok(outcome)) => {
                    timer.finish(outcome.label());
                    tracing::debug!(target: "scheduler", outcome = ?outcome, "iteration finished");
                    self.delay_after(&outcome)
                }
                Some(Err(e)) => {
                    timer.finish("error");
                    error_metrics().inc_error("scheduler", e.code());
                    tracing::error!(target: "scheduler", error = %e, "iteration failed");
                    self.config.backoff()
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "scheduler", "placement scheduler stopped");
    }

    async fn readiness(&mut self) -> Result<Readiness, SchedulerError> {
        let ledger = self.ctx.ledger.sync_status().await?;
        if !ledger.synced {
            return Ok(Readiness::Wait(TickOutcome::NotReady("ledger_syncing")));
        }
        if !self.ctx.progress.is_initial_recovery_done() {
            return Ok(Readiness::Wait(TickOutcome::NotReady("initial_recovery")));
        }
        let Some(address) = self.ctx.probe.public_address().await? else {
            return Ok(Readiness::Wait(TickOutcome::NotReady("no_public_address")));
        };
        let confirmed = self.ctx.ledger.is_node_confirmed(&address).await?;
        let now = self.now();
        if !confirmed {
            if self.confirmed != Some(false) {
                tracing::warn!(target: "scheduler", address = %address, "node is not confirmed");
            }
            self.confirmed = Some(false);
            return Ok(Readiness::Wait(TickOutcome::NotReady("not_confirmed")));
        }
        if self.confirmed == Some(false) {
            let until = now.saturating_add(self.config.quiescent_after_rejoin_secs * 1_000);
            tracing::info!(target: "scheduler", until, "node confirmed again, holding placements");
            self.quiescent_until = Some(until);
        }
        self.confirmed = Some(true);
        if let Some(until) = self.quiescent_until {
            if now < until {
                return Ok(Readiness::Wait(TickOutcome::Quiescent));
            }
            self.quiescent_until = None;
        }

        let capability = self.ctx.probe.capability().await?;
        if !capability.healthy {
            return Ok(Readiness::Wait(TickOutcome::NotReady("unhealthy")));
        }
        if capability.storage_only {
            return Ok(Readiness::Wait(TickOutcome::NotReady("storage_only")));
        }
        let geo = match self.ctx.probe.geolocation().await {
            Ok(geo) => geo,
            Err(e) => {
                tracing::debug!(target: "scheduler", error = %e, "geolocation unavailable");
                None
            }
        };
        Ok(Readiness::Ready(NodeView {
            address,
            capability,
            geo,
        }))
    }

    /// Under-replicated applications, by name.
    fn deficient(&self) -> Result<Vec<PlacementCandidate>, SchedulerError> {
        let counts = self.ctx.locations.running_counts()?;
        Ok(self
            .ctx
            .collections
            .registry_rows()?
            .iter()
            .map(|spec| {
                let actual = counts.get(&spec.name).copied().unwrap_or(0);
                PlacementCandidate::from_spec(spec, actual, self.config.default_required_replicas)
            })
            .filter(PlacementCandidate::is_deficient)
            .collect())
    }

    fn negative_key(candidate: &PlacementCandidate) -> String {
        format!("{}:{}", candidate.name, candidate.hash)
    }

    /// True if this node already runs, failed, or recently tried `candidate`.
    fn excluded(
        &mut self,
        candidate: &PlacementCandidate,
        address: &str,
        installed: &[LocalApp],
    ) -> Result<bool, SchedulerError> {
        if installed.iter().any(|a| a.spec.name == candidate.name) {
            return Ok(true);
        }
        if self.negative.contains(&Self::negative_key(candidate))
            || self.recent.contains(&candidate.name)
        {
            return Ok(true);
        }
        let here = |ip: &str| same_host(ip, address);
        if self
            .ctx
            .locations
            .running(&candidate.name)?
            .iter()
            .any(|r| here(&r.ip))
        {
            return Ok(true);
        }
        Ok(self
            .ctx
            .locations
            .install_errors(&candidate.name)?
            .iter()
            .any(|e| here(&e.ip)))
    }

    fn pop_due_deferred(
        &mut self,
        deficient: &[PlacementCandidate],
        now: TimestampMs,
    ) -> Option<PlacementCandidate> {
        for queue in [&mut self.deferred, &mut self.deferred_syncthing] {
            while let Some(check) = queue.pop_due(now) {
                match deficient.iter().find(|c| c.name == check.app_name) {
                    Some(candidate) => return Some(candidate.clone()),
                    None => {
                        tracing::debug!(target: "scheduler", name = %check.app_name, "deferred app no longer under-replicated");
                    }
                }
            }
        }
        None
    }

    fn defer_window(&self, candidate: &PlacementCandidate, tier: CapacityTier) -> DeferWindow {
        if candidate.data_replicating {
            self.config.defer_window_syncthing
        } else if candidate.enterprise {
            self.config.defer_window_enterprise
        } else {
            match tier {
                CapacityTier::Scarce => self.config.defer_window_scarce,
                CapacityTier::Common => self.config.defer_window_common,
            }
        }
    }

    /// Queues `candidate` for a later attempt, unless its window is disabled.
    fn defer(
        &mut self,
        candidate: &PlacementCandidate,
        tier: CapacityTier,
        now: TimestampMs,
    ) -> Option<TickOutcome> {
        let window = self.defer_window(candidate, tier);
        if window.is_disabled() {
            return None;
        }
        let hours = if window.max_hours > window.min_hours {
            self.rng.gen_range(window.min_hours..window.max_hours)
        } else {
            window.max_hours
        };
        let not_before = now.saturating_add((hours * 3_600_000.0) as u64);
        let check = DeferredCheck {
            app_name: candidate.name.clone(),
            hash: candidate.hash.clone(),
            required_replicas: candidate.required_replicas,
            not_before,
        };
        if candidate.data_replicating {
            self.deferred_syncthing.push(check);
        } else {
            self.deferred.push(check);
        }
        tracing::info!(target: "scheduler", name = %candidate.name, hours, "deferring placement");
        Some(TickOutcome::Deferred {
            name: candidate.name.clone(),
            not_before,
        })
    }

    /// Runs one iteration.
    pub async fn tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        let node = match self.readiness().await? {
            Readiness::Ready(node) => node,
            Readiness::Wait(outcome) => return Ok(outcome),
        };
        let now = self.now();
        let deficient = self.deficient()?;
        let installed = self.ctx.runtime.installed().await?;

        while let Some(candidate) = self.pop_due_deferred(&deficient, now) {
            if !self.excluded(&candidate, &node.address, &installed)? {
                tracing::debug!(target: "scheduler", name = %candidate.name, "retrying deferred candidate");
                return self.attempt(candidate, &node, &installed).await;
            }
        }

        let mut eligible = Vec::new();
        for candidate in deficient {
            if self.deferred.contains(&candidate.name)
                || self.deferred_syncthing.contains(&candidate.name)
                || self.excluded(&candidate, &node.address, &installed)?
            {
                continue;
            }
            if let Err(why) = eligibility::check(&candidate, &node.address, node.geo.as_ref()) {
                tracing::trace!(target: "scheduler", name = %candidate.name, reason = why.label(), "not eligible here");
                continue;
            }
            eligible.push(candidate);
        }
        let targeted: Vec<&PlacementCandidate> = eligible
            .iter()
            .filter(|c| eligibility::targets(c, &node.address))
            .collect();
        let chosen = if targeted.is_empty() {
            eligible.choose(&mut self.rng).cloned()
        } else {
            targeted.choose(&mut self.rng).map(|c| (*c).clone())
        };
        let Some(chosen) = chosen else {
            return Ok(TickOutcome::Idle);
        };

        if !eligibility::targets(&chosen, &node.address) {
            if let Some(outcome) = self.defer(&chosen, node.capability.tier, now) {
                return Ok(outcome);
            }
        }
        self.attempt(chosen, &node, &installed).await
    }

    /// Announces, ranks, installs and reconciles one candidate.
    async fn attempt(
        &mut self,
        candidate: PlacementCandidate,
        node: &NodeView,
        installed: &[LocalApp],
    ) -> Result<TickOutcome, SchedulerError> {
        let name = candidate.name.clone();
        let Some(spec) = self.ctx.collections.registry_row(&name)? else {
            return Ok(TickOutcome::Satisfied { name });
        };
        let required = spec.required_replicas(self.config.default_required_replicas) as usize;
        if self.ctx.locations.running(&name)?.len() >= required {
            return Ok(TickOutcome::Satisfied { name });
        }

        if let Err(failure) =
            compliance::check(&spec, &self.compliance, &node.capability, installed)
        {
            tracing::info!(target: "scheduler", name = %name, reason = %failure, "candidate fails compliance");
            self.negative
                .insert(&Self::negative_key(&candidate), self.negative_ttl());
            return Ok(TickOutcome::Ineligible {
                name,
                reason: failure.label(),
            });
        }
        for port in spec.public_ports() {
            let usable = self.ctx.probe.port_free_locally(port).await?
                && self.ctx.probe.port_reachable(port).await?;
            if !usable {
                tracing::info!(target: "scheduler", name = %name, port, "port not available");
                self.negative
                    .insert(&Self::negative_key(&candidate), self.negative_ttl());
                return Ok(TickOutcome::Ineligible {
                    name,
                    reason: "port_unavailable",
                });
            }
        }

        self.announce(&name, &node.address).await?;
        tokio::time::sleep(self.config.announce_settle()).await;

        let running = self.ctx.locations.running(&name)?.len();
        let installing = self.ctx.locations.installing(&name)?;
        if !ranking::may_proceed(running, &installing, &node.address, required) {
            tracing::info!(target: "scheduler", name = %name, running, installing = installing.len(), required, "earlier announcements cover the deficit, backing off");
            self.ctx
                .collections
                .delete_installing(&name, &node.address)?;
            return Ok(TickOutcome::BackedOff { name });
        }

        self.recent.insert(&name, self.recent_ttl());
        if let Err(e) = self.ctx.runtime.install(&spec).await {
            let e = SchedulerError::from(e);
            scheduler_metrics().inc_installs("failed");
            error_metrics().inc_error("scheduler", e.code());
            tracing::warn!(target: "scheduler", name = %name, error = %e, "install failed");
            self.report_install_error(&spec, &node.address, e.to_string())
                .await?;
            return Ok(TickOutcome::InstallFailed { name });
        }
        scheduler_metrics().inc_installs("ok");
        tracing::info!(target: "scheduler", name = %name, hash = %spec.hash, "replica installed");
        self.report_running(&spec, &node.address).await?;

        tokio::time::sleep(self.config.post_install_settle()).await;
        self.reconcile_after_install(&spec, &node.address, required)
            .await
    }

    fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.config.negative_ttl_secs)
    }

    fn recent_ttl(&self) -> Duration {
        Duration::from_secs(self.config.recent_attempt_ttl_secs)
    }

    async fn broadcast(&self, message: GossipMessage) {
        let kind = message.kind();
        if let Err(e) = self.ctx.transport.broadcast(message).await {
            tracing::warn!(target: "scheduler", kind, error = %e, "broadcast failed");
        }
    }

    async fn announce(&self, name: &str, address: &str) -> Result<(), SchedulerError> {
        let announcement = InstallingAnnouncement {
            name: name.to_string(),
            ip: address.to_string(),
            broadcasted_at: self.now(),
            expire_at: 0,
        };
        self.ctx.locations.on_installing(announcement.clone())?;
        tracing::debug!(target: "scheduler", name = %name, at = announcement.broadcasted_at, "announced install");
        self.broadcast(GossipMessage::AppInstalling(announcement))
            .await;
        Ok(())
    }

    async fn report_install_error(
        &self,
        spec: &AppSpecification,
        address: &str,
        error: String,
    ) -> Result<(), SchedulerError> {
        let record = InstallErrorRecord {
            name: spec.name.clone(),
            hash: spec.hash.clone(),
            ip: address.to_string(),
            error,
            broadcasted_at: self.now(),
            expire_at: 0,
        };
        self.ctx.locations.on_install_error(record.clone())?;
        self.broadcast(GossipMessage::AppInstallError(record)).await;
        Ok(())
    }

    async fn report_running(
        &self,
        spec: &AppSpecification,
        address: &str,
    ) -> Result<(), SchedulerError> {
        let now = self.now();
        let record = LocationRecord {
            name: spec.name.clone(),
            hash: spec.hash.clone(),
            ip: address.to_string(),
            broadcasted_at: now,
            expire_at: 0,
            running_since: now,
        };
        self.ctx.locations.on_running(record.clone())?;
        self.broadcast(GossipMessage::AppRunning(record)).await;
        Ok(())
    }

    /// Removes the fresh replica if the longest-running replicas already fill
    /// the required count.
    async fn reconcile_after_install(
        &self,
        spec: &AppSpecification,
        address: &str,
        required: usize,
    ) -> Result<TickOutcome, SchedulerError> {
        let name = spec.name.clone();
        let replicas = self.ctx.locations.running(&name)?;
        let position = replicas.iter().position(|r| same_host(&r.ip, address));
        match position {
            Some(position) if position >= required => {}
            _ => return Ok(TickOutcome::Installed { name }),
        }
        tracing::warn!(target: "scheduler", name = %name, replicas = replicas.len(), required, "app over-provisioned, removing own replica");
        self.ctx.runtime.remove(&name).await?;
        let notice = RemovedNotice {
            name: name.clone(),
            ip: address.to_string(),
            broadcasted_at: self.now(),
        };
        self.ctx.locations.on_removed(notice.clone())?;
        self.broadcast(GossipMessage::AppRemoved(notice)).await;
        scheduler_metrics().inc_self_removals();
        Ok(TickOutcome::SelfRemoved { name })
    }
}
