// Path: crates/node/src/bin/fleet-node.rs
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

use anyhow::Result;
use clap::Parser;
use fleet_node::{open_store, tasks, Collaborators, FleetNode};
use fleet_types::config::NodeConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[clap(name = "fleet-node", about = "Replicates the app registry and places apps on this node")]
struct NodeOpts {
    #[clap(long, env = "FLEET_CONFIG", help = "Path to fleet.toml; defaults apply when absent")]
    config: Option<PathBuf>,
    #[clap(long, env = "FLEET_DATA_DIR", help = "Overrides storage.data_dir in fleet.toml")]
    data_dir: Option<String>,
    #[clap(
        long,
        env = "FLEET_ADMIN_LISTEN",
        help = "Overrides network.admin_listen in fleet.toml"
    )]
    admin_listen: Option<String>,
    #[clap(
        long,
        env = "TELEMETRY_ADDR",
        help = "Overrides telemetry.listen in fleet.toml"
    )]
    telemetry_listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = NodeOpts::parse();

    let mut config = match &opts.config {
        Some(path) => fleet_node::config::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(dir) = opts.data_dir {
        config.storage.data_dir = Some(dir);
    }
    if let Some(addr) = opts.admin_listen {
        config.network.admin_listen = addr;
    }
    if let Some(addr) = opts.telemetry_listen {
        config.telemetry.listen = addr;
    }
    config.validate()?;

    // 1. Tracing before anything spawns.
    fleet_telemetry::init::init_tracing(&config.telemetry.log_filter)?;
    let admin_addr: SocketAddr = config.network.admin_listen.parse()?;
    let telemetry_addr: SocketAddr = config.telemetry.listen.parse()?;
    tracing::info!(
        target: "node",
        event = "startup",
        admin = %admin_addr,
        peers = config.network.peers.len(),
        backend = ?config.storage.backend
    );

    // 2. Metrics sink, then the telemetry server.
    let sink = fleet_telemetry::prometheus::install()?;
    if fleet_telemetry::sinks::SINK.set(sink).is_err() {
        tracing::warn!(target: "node", "metrics sink was already installed");
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let telemetry = tokio::spawn(fleet_telemetry::http::run_server(
        telemetry_addr,
        shutdown_rx.clone(),
    ));

    // 3. Store, collaborators and subsystems.
    let store = open_store(&config.storage)?;
    let collaborators = Collaborators::from_config(&config)?;
    let node = Arc::new(FleetNode::assemble(config, store, collaborators));

    let handles = vec![
        telemetry,
        tokio::spawn(fleet_node::admin::run_server(
            admin_addr,
            node.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(tasks::sync_loop(
            node.engine.clone(),
            node.config.sync.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(tasks::expiry_loop(
            node.projector.clone(),
            node.locations.clone(),
            node.config.registry.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(node.scheduler().run(shutdown_rx)),
    ];

    tokio::signal::ctrl_c().await?;
    tracing::info!(target: "node", event = "shutdown", "ctrl-c received, stopping");
    shutdown_tx.send(true)?;
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(target: "node", error = %e, "task ended abnormally");
        }
    }
    tracing::info!(target: "node", event = "stopped");
    Ok(())
}
