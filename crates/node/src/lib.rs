// Path: crates/node/src/lib.rs
#![forbid(unsafe_code)]
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
        clippy::indexing_slicing
    )
)]

//! # Fleet Node
//!
//! Wires the message sync engine, the registry projector, the location book
//! and the placement scheduler to concrete collaborators, and exposes the
//! admin and peer HTTP surface. The `fleet-node` binary is a thin shell over
//! [`FleetNode`].

/// HTTP adapters for peers and the local daemon.
pub mod adapters;
/// Admin and peer HTTP routes.
pub mod admin;
/// Config file loading.
pub mod config;
/// Periodic background loops.
pub mod tasks;

use adapters::{HttpPeerTransport, LocalDaemon};
use anyhow::Result;
use fleet_api::clock::{Clock, TokioClock};
use fleet_api::ledger::Ledger;
use fleet_api::node::{ContainerRuntime, NodeProbe};
use fleet_api::pricing::{Pricing, SpecValidator};
use fleet_api::progress::SyncProgress;
use fleet_api::sink::RegistrySink;
use fleet_api::store::DocumentStore;
use fleet_api::transport::Transport;
use fleet_registry::{LocationBook, RegistryProjector};
use fleet_scheduler::{PlacementScheduler, SchedulerContext};
use fleet_storage::{Collections, MemoryStore, RedbStore};
use fleet_sync::{LinearPricing, MessageSyncEngine, StructuralValidator, SyncContext};
use fleet_types::config::{NodeConfig, StorageBackend, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const STORE_FILE: &str = "fleet.redb";
const DEFAULT_DATA_DIR: &str = "./data";

/// Opens the configured document store.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!(target: "node", "using the in-memory store, state is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Redb => {
            let dir = PathBuf::from(config.data_dir.as_deref().unwrap_or(DEFAULT_DATA_DIR));
            std::fs::create_dir_all(&dir)?;
            Ok(Arc::new(RedbStore::open(dir.join(STORE_FILE))?))
        }
    }
}

/// Everything outside the node the engines talk to.
#[derive(Clone)]
pub struct Collaborators {
    /// Gossip transport.
    pub transport: Arc<dyn Transport>,
    /// Ledger daemon.
    pub ledger: Arc<dyn Ledger>,
    /// Container runtime.
    pub runtime: Arc<dyn ContainerRuntime>,
    /// Host probes.
    pub probe: Arc<dyn NodeProbe>,
    /// Specification validator.
    pub validator: Arc<dyn SpecValidator>,
    /// Resource pricing.
    pub pricing: Arc<dyn Pricing>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// The HTTP adapters described by `config`.
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let request_timeout = Duration::from_secs(config.sync.request_timeout_secs);
        let transport = HttpPeerTransport::new(
            config.network.peers.clone(),
            request_timeout,
            Duration::from_secs(config.sync.export_timeout_secs),
        )?;
        let daemon = Arc::new(LocalDaemon::new(
            config.network.daemon_url.clone(),
            request_timeout,
        )?);
        Ok(Self {
            transport: Arc::new(transport),
            ledger: daemon.clone(),
            runtime: daemon.clone(),
            probe: daemon,
            validator: Arc::new(StructuralValidator),
            pricing: Arc::new(LinearPricing::new(config.pricing.free_instances)),
            clock: Arc::new(TokioClock::new()),
        })
    }
}

/// The assembled node.
pub struct FleetNode {
    /// Effective configuration.
    pub config: NodeConfig,
    /// Typed store access shared by every subsystem.
    pub collections: Collections,
    /// Message sync engine.
    pub engine: Arc<MessageSyncEngine>,
    /// Registry projector.
    pub projector: Arc<RegistryProjector>,
    /// Running, installing and error books.
    pub locations: LocationBook,
    /// Shared catch-up flag.
    pub progress: Arc<SyncProgress>,
    /// External collaborators.
    pub collaborators: Collaborators,
}

impl FleetNode {
    /// Builds every subsystem over `store`.
    pub fn assemble(
        config: NodeConfig,
        store: Arc<dyn DocumentStore>,
        collaborators: Collaborators,
    ) -> Self {
        let collections = Collections::new(store);
        let progress = Arc::new(SyncProgress::new());
        let projector = Arc::new(RegistryProjector::new(
            config.registry.clone(),
            collections.clone(),
            collaborators.ledger.clone(),
            collaborators.runtime.clone(),
        ));
        let sink: Arc<dyn RegistrySink> = projector.clone();
        let engine = Arc::new(MessageSyncEngine::new(
            config.sync.clone(),
            config.pricing.clone(),
            SyncContext {
                collections: collections.clone(),
                transport: collaborators.transport.clone(),
                pricing: collaborators.pricing.clone(),
                validator: collaborators.validator.clone(),
                ledger: collaborators.ledger.clone(),
                clock: collaborators.clock.clone(),
                sink,
                progress: progress.clone(),
            },
        ));
        let locations = LocationBook::new(
            config.registry.clone(),
            collections.clone(),
            collaborators.clock.clone(),
        );
        Self {
            config,
            collections,
            engine,
            projector,
            locations,
            progress,
            collaborators,
        }
    }

    /// A placement scheduler sharing this node's state.
    pub fn scheduler(&self) -> PlacementScheduler {
        PlacementScheduler::new(
            self.config.scheduler.clone(),
            self.config.compliance.clone(),
            SchedulerContext {
                collections: self.collections.clone(),
                locations: self.locations.clone(),
                transport: self.collaborators.transport.clone(),
                ledger: self.collaborators.ledger.clone(),
                runtime: self.collaborators.runtime.clone(),
                probe: self.collaborators.probe.clone(),
                clock: self.collaborators.clock.clone(),
                progress: self.progress.clone(),
            },
        )
    }
}
