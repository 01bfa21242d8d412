// Path: crates/node/tests/admin.rs
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use fleet_api::transport::Transport;
use fleet_node::adapters::HttpPeerTransport;
use fleet_node::{admin, Collaborators, FleetNode};
use fleet_storage::MemoryStore;
use fleet_sync::LinearPricing;
use fleet_test_utils::clock::ManualClock;
use fleet_test_utils::fixtures::{register, registry_row};
use fleet_test_utils::mocks::{MockLedger, MockProbe, MockRuntime, MockTransport, MockValidator};
use fleet_types::app::{GossipMessage, LocationRecord};
use fleet_types::config::NodeConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const NOW: u64 = 1_700_000_000_000;

fn node() -> Arc<FleetNode> {
    node_with(NodeConfig::default())
}

fn node_with(config: NodeConfig) -> Arc<FleetNode> {
    let clock = Arc::new(ManualClock::new(NOW));
    let collaborators = Collaborators {
        transport: Arc::new(MockTransport::new()),
        ledger: Arc::new(MockLedger::at_height(1_000)),
        runtime: Arc::new(MockRuntime::new(clock.clone())),
        probe: Arc::new(MockProbe::healthy("10.0.0.1")),
        validator: Arc::new(MockValidator::accept_all()),
        pricing: Arc::new(LinearPricing::new(3)),
        clock,
    };
    Arc::new(FleetNode::assemble(
        config,
        Arc::new(MemoryStore::new()),
        collaborators,
    ))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &impl serde::Serialize) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn registry_rows_are_served_and_missing_ones_are_404() {
    let node = node();
    node.collections
        .upsert_registry(&registry_row("web", 900, 3))
        .unwrap();
    let app = admin::router(node);

    let (status, body) = call(&app, get("/registry/web")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "web");

    let (status, body) = call(&app, get("/registry")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, get("/registry/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn gossiped_running_claims_show_up_in_locations() {
    let app = admin::router(node());
    let claim = GossipMessage::AppRunning(LocationRecord {
        name: "web".into(),
        hash: "h1".into(),
        ip: "10.0.0.9".into(),
        broadcasted_at: NOW,
        expire_at: 0,
        running_since: NOW - 60_000,
    });

    let (status, body) = call(&app, post_json("/gossip", &claim)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "app_running");
    assert_eq!(body["accepted"], true);

    let (_, body) = call(&app, get("/locations/web")).await;
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["ip"], "10.0.0.9");
    let (_, body) = call(&app, get("/locations/other")).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn gossiped_messages_are_served_back_to_peers() {
    let app = admin::router(node());
    let message = register("web", NOW);
    let hash = message.hash.clone();

    let gossip = GossipMessage::AppMessage(message);
    let (_, body) = call(&app, post_json("/gossip", &gossip)).await;
    assert_eq!(body["accepted"], true);
    let (_, body) = call(&app, post_json("/gossip", &gossip)).await;
    assert_eq!(body["accepted"], false, "duplicates are not stored twice");

    let (status, body) = call(&app, get(&format!("/messages/{hash}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hash"], hash.as_str());

    let (_, body) = call(
        &app,
        post_json("/messages/batch", &vec![hash.clone(), "unknown".to_string()]),
    )
    .await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, get("/messages/unknown")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn tampered_messages_are_not_accepted() {
    let app = admin::router(node());
    let mut message = register("web", NOW);
    message.signature = "forged".into();
    let hash = message.hash.clone();

    let (_, body) = call(&app, post_json("/gossip", &GossipMessage::AppMessage(message))).await;
    assert_eq!(body["accepted"], false);
    let (status, _) = call(&app, get(&format!("/messages/{hash}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oversized_batches_are_rejected() {
    let app = admin::router(node());
    let hashes: Vec<String> = (0..1_001).map(|i| format!("h{i}")).collect();
    let (status, body) = call(&app, post_json("/messages/batch", &hashes)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn reindex_runs_as_a_background_task() {
    let node = node();
    node.collections
        .upsert_registry(&registry_row("stale", 900, 3))
        .unwrap();
    let app = admin::router(node.clone());

    let (status, body) = call(&app, Request::post("/admin/reindex").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["task_id"].as_str().unwrap().to_string();

    let mut last = Value::Null;
    for _ in 0..100 {
        let (status, body) = call(&app, get(&format!("/admin/tasks/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if body["state"] != "running" {
            last = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last["state"], "finished", "task body: {last}");
    assert_eq!(last["kind"], "reindex");
    assert!(
        node.collections.registry_row("stale").unwrap().is_none(),
        "a purging rebuild over no permanent messages empties the registry"
    );

    let (status, _) = call(&app, get("/admin/tasks/not-a-task")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_history_keeps_only_the_newest_records() {
    let mut config = NodeConfig::default();
    config.network.task_history = 2;
    let app = admin::router(node_with(config));

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (status, body) = call(&app, Request::post("/admin/reconcile").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        ids.push(body["task_id"].as_str().unwrap().to_string());
    }

    let (status, _) = call(&app, get(&format!("/admin/tasks/{}", ids[0]))).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "the oldest record is dropped");
    for id in &ids[1..] {
        let (status, body) = call(&app, get(&format!("/admin/tasks/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "reconcile");
    }
}

#[tokio::test]
async fn sync_status_reflects_recovery_progress() {
    let node = node();
    let app = admin::router(node.clone());

    let (_, body) = call(&app, get("/sync/status")).await;
    assert_eq!(body["synced"], false);
    assert_eq!(body["height"], 1_000);

    node.progress.mark_initial_recovery_done();
    let (_, body) = call(&app, get("/sync/status")).await;
    assert_eq!(body["synced"], true);
}

#[tokio::test]
async fn http_transport_talks_to_the_peer_routes() {
    let node = node();
    node.progress.mark_initial_recovery_done();
    let app = admin::router(node.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    let peer = format!("http://{addr}");
    let transport = HttpPeerTransport::new(
        vec![peer.clone()],
        Duration::from_secs(5),
        Duration::from_secs(5),
    )
    .unwrap();

    let message = register("web", NOW);
    transport
        .broadcast(GossipMessage::AppMessage(message.clone()))
        .await
        .unwrap();
    let fetched = transport.request(&message.hash).await.unwrap();
    assert_eq!(fetched.map(|m| m.hash), Some(message.hash.clone()));
    assert!(transport.request("unknown").await.unwrap().is_none());

    let many = transport
        .request_many(&[message.hash.clone(), "unknown".to_string()])
        .await
        .unwrap();
    assert_eq!(many.len(), 1);

    let status = transport.peer_status(&peer).await.unwrap();
    assert!(status.synced);
    assert_eq!(status.height, 1_000);
    assert!(transport.fetch_permanent_messages(&peer).await.unwrap().is_empty());
}
