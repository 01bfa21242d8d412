// Path: crates/scheduler/tests/scheduler.rs
use fleet_api::clock::{Clock, TokioClock};
use fleet_api::progress::SyncProgress;
use fleet_registry::LocationBook;
use fleet_scheduler::{PlacementScheduler, SchedulerContext, TickOutcome};
use fleet_storage::Collections;
use fleet_test_utils::fixtures::{memory_collections, registry_row};
use fleet_test_utils::mocks::{MockLedger, MockProbe, MockRuntime, MockTransport};
use fleet_types::app::{AppSpecification, GossipMessage, LocationRecord, NodeGeo};
use fleet_types::config::{ComplianceConfig, DeferWindow, RegistryConfig, SchedulerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const HOUR_MS: u64 = 3_600_000;

struct Node {
    scheduler: PlacementScheduler,
    address: String,
    runtime: Arc<MockRuntime>,
    probe: Arc<MockProbe>,
    ledger: Arc<MockLedger>,
    transport: Arc<MockTransport>,
}

struct Network {
    collections: Collections,
    book: LocationBook,
    clock: Arc<TokioClock>,
}

impl Network {
    fn new() -> Self {
        let collections = memory_collections();
        let clock = Arc::new(TokioClock::starting_at(1_700_000_000_000));
        let book = LocationBook::new(RegistryConfig::default(), collections.clone(), clock.clone());
        Self {
            collections,
            book,
            clock,
        }
    }

    fn register(&self, spec: &AppSpecification) {
        self.collections.upsert_registry(spec).unwrap();
    }

    fn running_elsewhere(&self, name: &str, ip: &str) {
        let now = self.clock.now_ms();
        self.book
            .on_running(LocationRecord {
                name: name.into(),
                hash: "h".into(),
                ip: ip.into(),
                broadcasted_at: now,
                expire_at: 0,
                running_since: now - HOUR_MS,
            })
            .unwrap();
    }

    fn node(&self, address: &str, config: SchedulerConfig, compliance: ComplianceConfig) -> Node {
        let runtime = Arc::new(MockRuntime::new(self.clock.clone()));
        let probe = Arc::new(MockProbe::healthy(address));
        let ledger = Arc::new(MockLedger::at_height(10_000));
        let transport = Arc::new(MockTransport::new());
        let progress = Arc::new(SyncProgress::new());
        progress.mark_initial_recovery_done();
        let ctx = SchedulerContext {
            collections: self.collections.clone(),
            locations: self.book.clone(),
            transport: transport.clone(),
            ledger: ledger.clone(),
            runtime: runtime.clone(),
            probe: probe.clone(),
            clock: self.clock.clone(),
            progress,
        };
        Node {
            scheduler: PlacementScheduler::with_seed(config, compliance, ctx, 7),
            address: address.to_string(),
            runtime,
            probe,
            ledger,
            transport,
        }
    }
}

fn immediate() -> SchedulerConfig {
    let off = DeferWindow {
        min_hours: 0.0,
        max_hours: 0.0,
    };
    SchedulerConfig {
        defer_window_common: off,
        defer_window_scarce: off,
        defer_window_enterprise: off,
        defer_window_syncthing: off,
        ..SchedulerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn waits_for_every_precondition() {
    let net = Network::new();
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());

    node.ledger.set_synced(false);
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("ledger_syncing")
    );
    node.ledger.set_synced(true);

    node.probe.set_address(None);
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("no_public_address")
    );
    node.probe.set_address(Some("10.0.0.1:16127"));

    node.probe.update_capability(|c| c.storage_only = true);
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("storage_only")
    );
    node.probe.update_capability(|c| {
        c.storage_only = false;
        c.healthy = false;
    });
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("unhealthy")
    );
    node.probe.update_capability(|c| c.healthy = true);
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn waits_for_initial_recovery() {
    let net = Network::new();
    let clock = net.clock.clone();
    let progress = Arc::new(SyncProgress::new());
    let ctx = SchedulerContext {
        collections: net.collections.clone(),
        locations: net.book.clone(),
        transport: Arc::new(MockTransport::new()),
        ledger: Arc::new(MockLedger::at_height(10_000)),
        runtime: Arc::new(MockRuntime::new(clock.clone())),
        probe: Arc::new(MockProbe::healthy("10.0.0.1")),
        clock,
        progress: progress.clone(),
    };
    let mut scheduler =
        PlacementScheduler::with_seed(immediate(), ComplianceConfig::default(), ctx, 1);

    assert_eq!(
        scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("initial_recovery")
    );
    progress.mark_initial_recovery_done();
    assert_eq!(scheduler.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn stays_quiet_after_regaining_confirmation() {
    let net = Network::new();
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);

    node.ledger.set_confirmed(false);
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::NotReady("not_confirmed")
    );

    node.ledger.set_confirmed(true);
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Quiescent);
    tokio::time::advance(Duration::from_secs(124 * 60)).await;
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Quiescent);
    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn later_announcer_backs_off_when_one_replica_is_missing() {
    let net = Network::new();
    net.register(&registry_row("x", 100, 3));
    net.running_elsewhere("x", "10.0.0.8");
    net.running_elsewhere("x", "10.0.0.9");
    let mut a = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    let mut b = net.node("10.0.0.2:16127", immediate(), ComplianceConfig::default());

    let (first, second) = tokio::join!(a.scheduler.tick(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        b.scheduler.tick().await
    });

    assert_eq!(first.unwrap(), TickOutcome::Installed { name: "x".into() });
    assert_eq!(second.unwrap(), TickOutcome::BackedOff { name: "x".into() });
    assert_eq!(a.runtime.installs(), vec!["x".to_string()]);
    assert!(b.runtime.installs().is_empty());
    assert!(matches!(
        b.transport.broadcasts().first(),
        Some(GossipMessage::AppInstalling(ann)) if ann.ip == b.address
    ));
    assert_eq!(net.book.running("x").unwrap().len(), 3);
    assert!(net.book.installing("x").unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn untargeted_candidates_are_deferred_then_retried() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 3));
    let mut node = net.node("10.0.0.1:16127", SchedulerConfig::default(), ComplianceConfig::default());
    let start = net.clock.now_ms();

    let outcome = node.scheduler.tick().await.unwrap();
    let TickOutcome::Deferred { name, not_before } = outcome else {
        panic!("expected deferral, got {outcome:?}");
    };
    assert_eq!(name, "web");
    assert!(not_before >= start + HOUR_MS && not_before <= start + 2 * HOUR_MS);
    assert_eq!(node.scheduler.deferred_len(), 1);
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);

    tokio::time::advance(Duration::from_millis(2 * HOUR_MS)).await;
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Installed { name: "web".into() }
    );
    assert_eq!(node.scheduler.deferred_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn scarce_nodes_defer_for_less_time() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 3));
    let mut node = net.node("10.0.0.1:16127", SchedulerConfig::default(), ComplianceConfig::default());
    node.probe
        .update_capability(|c| c.tier = fleet_types::app::CapacityTier::Scarce);
    let start = net.clock.now_ms();

    let TickOutcome::Deferred { not_before, .. } = node.scheduler.tick().await.unwrap() else {
        panic!("expected deferral");
    };
    assert!(not_before >= start + HOUR_MS / 5 && not_before <= start + HOUR_MS / 2);
}

/// Distinct windows so the chosen window shows in `not_before`.
fn separated_windows() -> SchedulerConfig {
    SchedulerConfig {
        defer_window_common: DeferWindow {
            min_hours: 1.0,
            max_hours: 2.0,
        },
        defer_window_enterprise: DeferWindow {
            min_hours: 3.0,
            max_hours: 4.0,
        },
        defer_window_syncthing: DeferWindow {
            min_hours: 5.0,
            max_hours: 6.0,
        },
        ..SchedulerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn data_replicating_apps_wait_in_their_own_queue() {
    let net = Network::new();
    let mut spec = registry_row("vault", 100, 3);
    spec.compose[0].container_data = "g:/data".into();
    net.register(&spec);
    let mut node = net.node("10.0.0.1:16127", separated_windows(), ComplianceConfig::default());
    let start = net.clock.now_ms();

    let TickOutcome::Deferred { name, not_before } = node.scheduler.tick().await.unwrap() else {
        panic!("expected deferral");
    };
    assert_eq!(name, "vault");
    assert!(not_before >= start + 5 * HOUR_MS && not_before <= start + 6 * HOUR_MS);
    assert_eq!(node.scheduler.deferred_len(), 1);

    // Still queued after the common window has passed.
    tokio::time::advance(Duration::from_millis(2 * HOUR_MS)).await;
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);

    tokio::time::advance(Duration::from_millis(4 * HOUR_MS)).await;
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Installed {
            name: "vault".into()
        }
    );
    assert_eq!(node.scheduler.deferred_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn enterprise_apps_ignore_node_scoping_and_use_their_window() {
    let net = Network::new();
    let mut corp = registry_row("corp", 100, 3);
    corp.enterprise = "sealed-payload".into();
    corp.nodes = vec!["10.0.0.5".into()];
    net.register(&corp);
    let mut scoped = registry_row("scoped", 100, 3);
    scoped.nodes = vec!["10.0.0.5".into()];
    net.register(&scoped);
    let mut node = net.node("10.0.0.1:16127", separated_windows(), ComplianceConfig::default());
    let start = net.clock.now_ms();

    let TickOutcome::Deferred { name, not_before } = node.scheduler.tick().await.unwrap() else {
        panic!("expected deferral");
    };
    assert_eq!(name, "corp", "the scoped app names another node and is skipped");
    assert!(not_before >= start + 3 * HOUR_MS && not_before <= start + 4 * HOUR_MS);
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);

    tokio::time::advance(Duration::from_millis(4 * HOUR_MS)).await;
    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Installed {
            name: "corp".into()
        }
    );
    assert!(node.runtime.installs().iter().all(|n| n != "scoped"));
}

#[tokio::test(start_paused = true)]
async fn targeted_apps_install_without_deferral() {
    let net = Network::new();
    let mut spec = registry_row("pinned", 100, 1);
    spec.nodes = vec!["10.0.0.1".into()];
    net.register(&spec);
    net.register(&registry_row("other", 100, 3));
    let mut node = net.node("10.0.0.1:16127", SchedulerConfig::default(), ComplianceConfig::default());

    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Installed {
            name: "pinned".into()
        }
    );
    let kinds: Vec<_> = node.transport.broadcasts().iter().map(|m| m.kind()).collect();
    assert_eq!(kinds, vec!["app_installing", "app_running"]);
}

#[tokio::test(start_paused = true)]
async fn apps_targeting_other_nodes_are_skipped() {
    let net = Network::new();
    let mut spec = registry_row("elsewhere", 100, 1);
    spec.nodes = vec!["10.0.0.5".into()];
    net.register(&spec);
    let mut geo_locked = registry_row("americas", 100, 1);
    geo_locked.geolocation = vec!["acNA".into()];
    net.register(&geo_locked);
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    node.probe.set_geo(Some(NodeGeo {
        continent: "EU".into(),
        country: "CZ".into(),
        region: None,
    }));

    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert!(node.transport.broadcasts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn compliance_failures_are_cached() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 3));
    let compliance = ComplianceConfig {
        blocked_ports: vec![31000],
        ..ComplianceConfig::default()
    };
    let mut node = net.node("10.0.0.1:16127", immediate(), compliance);

    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Ineligible {
            name: "web".into(),
            reason: "blocked_port"
        }
    );
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert!(node.transport.broadcasts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unreachable_ports_are_cached() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 3));
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    node.probe.block_port(31000);

    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::Ineligible {
            name: "web".into(),
            reason: "port_unavailable"
        }
    );
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn install_failures_are_reported_and_not_retried() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 3));
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    node.runtime.fail_installs_of("web");

    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::InstallFailed { name: "web".into() }
    );
    let errors = net.book.install_errors("web").unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].ip, node.address);
    assert!(node
        .transport
        .broadcasts()
        .iter()
        .any(|m| m.kind() == "app_install_error"));
    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
}

#[tokio::test(start_paused = true)]
async fn over_provisioned_replica_removes_itself() {
    let net = Network::new();
    net.register(&registry_row("solo", 100, 1));
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());

    let book = net.book.clone();
    let clock = net.clock.clone();
    let late_claim = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(45)).await;
        let now = clock.now_ms();
        book.on_running(LocationRecord {
            name: "solo".into(),
            hash: "h".into(),
            ip: "10.0.0.7".into(),
            broadcasted_at: now,
            expire_at: 0,
            running_since: now - HOUR_MS,
        })
        .unwrap();
    });

    assert_eq!(
        node.scheduler.tick().await.unwrap(),
        TickOutcome::SelfRemoved {
            name: "solo".into()
        }
    );
    late_claim.await.unwrap();
    assert_eq!(node.runtime.removals(), vec!["solo".to_string()]);
    let running: Vec<_> = net
        .book
        .running("solo")
        .unwrap()
        .into_iter()
        .map(|r| r.ip)
        .collect();
    assert_eq!(running, vec!["10.0.0.7".to_string()]);
    assert_eq!(
        node.transport.broadcasts().last().map(|m| m.kind()),
        Some("app_removed")
    );
}

#[tokio::test(start_paused = true)]
async fn satisfied_apps_are_left_alone() {
    let net = Network::new();
    net.register(&registry_row("web", 100, 2));
    net.running_elsewhere("web", "10.0.0.8");
    net.running_elsewhere("web", "10.0.0.9");
    let mut node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());

    assert_eq!(node.scheduler.tick().await.unwrap(), TickOutcome::Idle);
    assert!(node.runtime.installs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn loop_stops_on_shutdown() {
    let net = Network::new();
    let node = net.node("10.0.0.1:16127", immediate(), ComplianceConfig::default());
    node.ledger.set_synced(false);
    let (tx, rx) = watch::channel(false);

    let handle = tokio::spawn(node.scheduler.run(rx));
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    tx.send(true).unwrap();

    handle.await.unwrap();
}
