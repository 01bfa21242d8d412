// Path: crates/sync/tests/engine.rs
use fleet_api::clock::TokioClock;
use fleet_api::progress::SyncProgress;
use fleet_sync::{IntakeOutcome, LinearPricing, MessageSyncEngine, SyncContext};
use fleet_test_utils::fixtures::{
    anchor_for, anchored, memory_collections, register, signed_message, spec_json,
};
use fleet_test_utils::mocks::{MockLedger, MockTransport, MockValidator, RecordingSink};
use fleet_types::app::{
    GossipMessage, HashRecord, MessageType, PeerSyncStatus, PriceFork, StoredMessage,
};
use fleet_types::config::{PricingConfig, SyncConfig};
use std::sync::Arc;
use std::time::Duration;

const ACTIVATION: u64 = 1_000;

struct Harness {
    engine: MessageSyncEngine,
    transport: Arc<MockTransport>,
    ledger: Arc<MockLedger>,
    validator: Arc<MockValidator>,
    sink: Arc<RecordingSink>,
}

fn pricing() -> PricingConfig {
    PricingConfig {
        forks: vec![PriceFork {
            height: 0,
            cpu: 1.0,
            ram: 0.0,
            hdd: 0.0,
            min_price: 0.5,
            static_ip: 0.0,
            enterprise: 0.0,
        }],
        ..PricingConfig::default()
    }
}

fn harness() -> Harness {
    let transport = Arc::new(MockTransport::new());
    let ledger = Arc::new(MockLedger::at_height(2_000));
    let validator = Arc::new(MockValidator::accept_all());
    let sink = Arc::new(RecordingSink::new());
    let ctx = SyncContext {
        collections: memory_collections(),
        transport: transport.clone(),
        pricing: Arc::new(LinearPricing::new(3)),
        validator: validator.clone(),
        ledger: ledger.clone(),
        clock: Arc::new(TokioClock::starting_at(1_700_000_000_000)),
        sink: sink.clone(),
        progress: Arc::new(SyncProgress::new()),
    };
    let config = SyncConfig {
        activation_height: ACTIVATION,
        ..SyncConfig::default()
    };
    Harness {
        engine: MessageSyncEngine::new(config, pricing(), ctx),
        transport,
        ledger,
        validator,
        sink,
    }
}

#[tokio::test(start_paused = true)]
async fn anchors_below_activation_make_no_network_calls() {
    let h = harness();
    let message = register("legacy", 1);
    h.transport.serve(message.clone());

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, ACTIVATION - 1, 1.0))
        .await
        .unwrap();

    assert!(!resolved);
    assert_eq!(h.transport.network_calls(), 0);
    assert!(!h.engine.collections().has_permanent(&message.hash).unwrap());
}

#[tokio::test(start_paused = true)]
async fn paid_message_from_peer_is_accepted_and_projected() {
    let h = harness();
    let message = register("web", 1);
    h.transport.serve(message.clone());

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();

    assert!(resolved);
    let stored = h.engine.collections().permanent_message(&message.hash).unwrap().unwrap();
    assert!(!stored.underpaid);
    assert_eq!(stored.message.height, 1_500);
    assert!(h.engine.collections().hash_record(&message.hash).unwrap().unwrap().has_message);
    assert_eq!(h.sink.applied_hashes(), vec![message.hash]);
}

#[tokio::test(start_paused = true)]
async fn underpaid_message_is_retained_but_not_projected() {
    let h = harness();
    let message = register("cheap", 1);
    h.transport.serve(message.clone());

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, 1_500, 0.2))
        .await
        .unwrap();

    assert!(resolved);
    let stored: StoredMessage = h
        .engine
        .collections()
        .permanent_message(&message.hash)
        .unwrap()
        .unwrap();
    assert!(stored.underpaid);
    assert!(h.engine.collections().hash_record(&message.hash).unwrap().unwrap().has_message);
    assert!(h.sink.applied_hashes().is_empty());
    assert!(h.engine.collections().accepted_messages(0).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn live_resolve_gives_up_after_bounded_attempts() {
    let h = harness();
    let message = register("ghost", 1);

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();

    assert!(!resolved);
    assert_eq!(h.transport.requests().len(), 3);
    let record = h.engine.collections().hash_record(&message.hash).unwrap().unwrap();
    assert!(!record.has_message);
    assert!(!record.message_not_found);
}

#[tokio::test(start_paused = true)]
async fn invalid_specification_is_marked_not_found() {
    let h = harness();
    let message = register("bad", 1);
    h.transport.serve(message.clone());
    h.validator.reject("bad");

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();

    assert!(resolved);
    let record = h.engine.collections().hash_record(&message.hash).unwrap().unwrap();
    assert!(record.message_not_found);
    assert!(!h.engine.collections().has_permanent(&message.hash).unwrap());
    assert!(h.sink.applied_hashes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn gossiped_message_is_stored_rebroadcast_and_promoted_on_anchor() {
    let h = harness();
    let message = register("chat", 1);

    assert_eq!(
        h.engine.intake_temporary(message.clone()).await.unwrap(),
        IntakeOutcome::Stored
    );
    assert_eq!(
        h.engine.intake_temporary(message.clone()).await.unwrap(),
        IntakeOutcome::Duplicate
    );
    assert_eq!(h.transport.broadcasts(), vec![GossipMessage::AppMessage(message.clone())]);

    let resolved = h
        .engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();
    assert!(resolved);
    assert!(h.transport.requests().is_empty());
    assert!(h
        .engine
        .collections()
        .temporary_message(&message.hash, 0)
        .unwrap()
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn tampered_gossip_is_dropped() {
    let h = harness();
    let mut message = register("evil", 1);
    message.signature = "forged".into();

    assert_eq!(
        h.engine.intake_temporary(message).await.unwrap(),
        IntakeOutcome::InvalidHash
    );
    assert!(h.transport.broadcasts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_gossip_resolves_a_known_anchor() {
    let h = harness();
    let message = register("late", 1);
    h.engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();
    assert!(h.sink.applied_hashes().is_empty());

    h.engine.intake_temporary(message.clone()).await.unwrap();

    assert!(h.engine.collections().has_permanent(&message.hash).unwrap());
    assert_eq!(h.sink.applied_hashes(), vec![message.hash]);
}

#[tokio::test(start_paused = true)]
async fn sweep_resolves_what_peers_now_serve() {
    let h = harness();
    let found = register("found", 1);
    let lost = register("lost", 2);
    for m in [&found, &lost] {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(m, 1_900, 1.0)))
            .unwrap();
    }
    h.transport.serve(found.clone());

    let report = h.engine.sweep_missing(false).await.unwrap();

    assert_eq!(report.missing, 2);
    assert_eq!(report.requested, 2);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.given_up, 0);
    assert!(h.engine.collections().has_permanent(&found.hash).unwrap());
    assert!(!h.engine.collections().has_permanent(&lost.hash).unwrap());
}

#[tokio::test(start_paused = true)]
async fn old_anchors_are_given_up_sooner() {
    let h = harness();
    let config = SyncConfig::default();
    let old = register("old", 1);
    let fresh = register("fresh", 2);
    let current = 2_000 + 16 * config.blocks_lasting;
    h.ledger.set_height(current);
    for (m, height) in [(&old, 2_000), (&fresh, current)] {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(m, height, 1.0)))
            .unwrap();
    }
    assert_eq!(h.engine.maturity(current, 2_000), config.max_maturity);
    assert_eq!(h.engine.maturity(current, current), 0);

    h.engine.sweep_missing(false).await.unwrap();
    h.engine.sweep_missing(false).await.unwrap();
    let third = h.engine.sweep_missing(false).await.unwrap();

    assert_eq!(third.given_up, 1);
    assert!(h.engine.collections().hash_record(&old.hash).unwrap().unwrap().message_not_found);
    assert!(!h.engine.collections().hash_record(&fresh.hash).unwrap().unwrap().message_not_found);

    // Given-up records only come back with a forced sweep.
    let normal = h.engine.sweep_missing(false).await.unwrap();
    assert_eq!(normal.missing, 1);
    let forced = h.engine.sweep_missing(true).await.unwrap();
    assert_eq!(forced.missing, 2);
}

#[tokio::test(start_paused = true)]
async fn bulk_recovery_replays_a_synced_peer_export() {
    let h = harness();
    let messages: Vec<_> = (0..20u64).map(|i| register(&format!("app{i}"), i + 1)).collect();
    for (i, m) in messages.iter().enumerate() {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(
                m,
                1_100 + i as u64,
                1.0,
            )))
            .unwrap();
    }
    let export: Vec<_> = messages
        .iter()
        .enumerate()
        .rev()
        .map(|(i, m)| anchored(m, 1_100 + i as u64, 1.0))
        .collect();
    h.transport.add_peer(
        "10.0.0.1:16127",
        Some(PeerSyncStatus {
            synced: false,
            height: 2_000,
        }),
        Vec::new(),
    );
    h.transport.add_peer("10.0.0.2:16127", None, Vec::new());
    h.transport.add_peer(
        "10.0.0.3:16127",
        Some(PeerSyncStatus {
            synced: true,
            height: 2_000,
        }),
        export,
    );
    assert!(h.engine.needs_bulk_recovery().unwrap());

    let report = h.engine.bulk_recover().await.unwrap();

    assert_eq!(report.peer, "10.0.0.3:16127");
    assert_eq!(report.exported, 20);
    assert_eq!(report.resolved, 20);
    assert!(h.engine.progress().is_initial_recovery_done());
    assert_eq!(h.engine.collections().hash_record_counts().unwrap(), (20, 0));
    // Replayed in anchor order.
    let applied = h.sink.applied_hashes();
    let expected: Vec<_> = messages.iter().map(|m| m.hash.clone()).collect();
    assert_eq!(applied, expected);
}

#[tokio::test(start_paused = true)]
async fn bulk_recovery_fails_without_a_synced_peer() {
    let h = harness();
    h.transport.add_peer("10.0.0.2:16127", None, Vec::new());
    assert!(matches!(
        h.engine.bulk_recover().await,
        Err(fleet_types::error::SyncError::NoSyncedPeer)
    ));
    assert!(!h.engine.progress().is_initial_recovery_done());
}

#[tokio::test(start_paused = true)]
async fn self_status_requires_recovery_and_no_missing_anchors() {
    let h = harness();
    assert!(!h.engine.self_status().await.unwrap().synced);

    h.engine.catch_up().await.unwrap();
    let status = h.engine.self_status().await.unwrap();
    assert!(status.synced);
    assert_eq!(status.height, 2_000);

    h.ledger.set_synced(false);
    assert!(!h.engine.self_status().await.unwrap().synced);
}

#[tokio::test(start_paused = true)]
async fn reconcile_repairs_has_message_flags() {
    let h = harness();
    let message = register("drift", 1);
    h.transport.serve(message.clone());
    h.engine
        .record_anchor(anchor_for(&message, 1_500, 1.0))
        .await
        .unwrap();
    h.engine
        .collections()
        .set_has_message(&message.hash, false)
        .unwrap();

    assert_eq!(h.engine.reconcile().unwrap(), 1);
    assert_eq!(h.engine.reconcile().unwrap(), 0);
    assert!(h.engine.collections().hash_record(&message.hash).unwrap().unwrap().has_message);
}

#[tokio::test(start_paused = true)]
async fn stale_temporary_messages_are_purged() {
    let h = harness();
    h.engine.intake_temporary(register("short", 1)).await.unwrap();
    assert_eq!(h.engine.purge_temporary().unwrap(), 0);

    tokio::time::advance(Duration::from_secs(3_601)).await;
    assert_eq!(h.engine.purge_temporary().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn update_pays_only_for_the_unexpired_remainder() {
    let h = harness();
    h.ledger.set_height(20_000);
    let original = register("web", 1);
    h.transport.serve(original.clone());
    assert!(h
        .engine
        .record_anchor(anchor_for(&original, 1_500, 1.0))
        .await
        .unwrap());

    // Full price 4.0; half of the 1.0 registration is still unexpired, so the
    // discounted due is (4.0 - 0.5) * 0.9 = 3.15.
    let update = signed_message(MessageType::Update, spec_json("web", 4.0, 1000, 10, 3), 2);
    h.transport.serve(update.clone());
    assert!(h
        .engine
        .record_anchor(anchor_for(&update, 1_500 + 11_000, 3.2))
        .await
        .unwrap());
    let stored = h.engine.collections().permanent_message(&update.hash).unwrap().unwrap();
    assert!(!stored.underpaid);

    // Without an accepted predecessor the same payment falls short of 4.0 * 0.9.
    let orphan = signed_message(MessageType::Update, spec_json("api", 4.0, 1000, 10, 3), 3);
    h.transport.serve(orphan.clone());
    h.engine
        .record_anchor(anchor_for(&orphan, 1_500 + 11_000, 3.2))
        .await
        .unwrap();
    let stored = h.engine.collections().permanent_message(&orphan.hash).unwrap().unwrap();
    assert!(stored.underpaid);

    assert_eq!(h.sink.applied_hashes(), vec![original.hash, update.hash]);
}

#[tokio::test(start_paused = true)]
async fn sweep_splits_requests_into_batches_with_a_settle_delay() {
    let h = harness();
    let config = SyncConfig::default();
    let messages: Vec<_> = (0..config.sweep_batch_size as u64 + 1)
        .map(|i| register(&format!("app{i}"), i + 1))
        .collect();
    for m in &messages {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(m, 1_900, 1.0)))
            .unwrap();
    }
    h.transport.serve(messages[0].clone());
    h.transport.serve(messages[messages.len() - 1].clone());
    let started = tokio::time::Instant::now();

    let report = h.engine.sweep_missing(false).await.unwrap();

    assert_eq!(report.missing, messages.len());
    assert_eq!(report.requested, messages.len());
    assert_eq!(report.resolved, 2);
    assert_eq!(h.transport.requests().len(), messages.len());
    // One delay between the two batches and none after the last.
    assert_eq!(started.elapsed(), config.sweep_batch_delay());
}

#[tokio::test(start_paused = true)]
async fn catch_up_switches_to_bulk_recovery_above_the_threshold() {
    let h = harness();
    let messages: Vec<_> = (0..20u64).map(|i| register(&format!("app{i}"), i + 1)).collect();
    for (i, m) in messages.iter().enumerate() {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(m, 1_100 + i as u64, 1.0)))
            .unwrap();
    }
    let export = messages
        .iter()
        .enumerate()
        .map(|(i, m)| anchored(m, 1_100 + i as u64, 1.0))
        .collect();
    h.transport.add_peer(
        "10.0.0.3:16127",
        Some(PeerSyncStatus {
            synced: true,
            height: 2_000,
        }),
        export,
    );

    h.engine.catch_up().await.unwrap();

    assert!(h.transport.requests().is_empty(), "bulk recovery makes no per-hash requests");
    assert!(h.engine.progress().is_initial_recovery_done());
    assert_eq!(h.engine.collections().hash_record_counts().unwrap(), (20, 0));
}

#[tokio::test(start_paused = true)]
async fn catch_up_sweeps_at_the_threshold() {
    let h = harness();
    let messages: Vec<_> = (0..20u64).map(|i| register(&format!("app{i}"), i + 1)).collect();
    for m in &messages {
        h.engine
            .collections()
            .insert_hash_record(&HashRecord::new(anchor_for(m, 1_900, 1.0)))
            .unwrap();
    }
    // 19 of 20 missing is exactly 0.95, which does not exceed the threshold.
    h.engine
        .collections()
        .set_has_message(&messages[0].hash, true)
        .unwrap();
    h.transport.add_peer(
        "10.0.0.3:16127",
        Some(PeerSyncStatus {
            synced: true,
            height: 2_000,
        }),
        Vec::new(),
    );
    assert!(!h.engine.needs_bulk_recovery().unwrap());

    h.engine.catch_up().await.unwrap();

    assert_eq!(h.transport.requests().len(), 19);
    assert!(h.engine.progress().is_initial_recovery_done());
}

#[tokio::test(start_paused = true)]
async fn unresolvable_anchors_do_not_block_synced_status() {
    let h = harness();
    let old = register("old", 1);
    let lost = register("lost", 2);
    h.engine
        .record_anchor(anchor_for(&old, ACTIVATION - 1, 1.0))
        .await
        .unwrap();
    h.engine
        .collections()
        .insert_hash_record(&HashRecord::new(anchor_for(&lost, 1_900, 1.0)))
        .unwrap();
    h.engine.collections().mark_not_found(&lost.hash).unwrap();

    h.engine.catch_up().await.unwrap();
    h.engine.sweep_missing(true).await.unwrap();
    h.engine.reconcile().unwrap();

    assert_eq!(h.engine.collections().hash_record_counts().unwrap(), (2, 2));
    assert!(h.engine.self_status().await.unwrap().synced);

    // A resolvable anchor that is still missing does hold the view back.
    let pending = register("pending", 3);
    h.engine
        .collections()
        .insert_hash_record(&HashRecord::new(anchor_for(&pending, 1_900, 1.0)))
        .unwrap();
    assert!(!h.engine.self_status().await.unwrap().synced);
}
