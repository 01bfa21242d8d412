// Path: crates/node/src/admin.rs
//! The node's HTTP surface.
//!
//! Admin routes trigger rebuilds, sweeps and reconciliation as background
//! tasks and expose the hash, location and registry tables read-only. Peer
//! routes serve gossip intake, message lookups, sync status and the full
//! permanent export that [`crate::adapters::HttpPeerTransport`] calls.

use crate::FleetNode;
use axum::{
    error_handling::HandleErrorLayer,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use fleet_sync::IntakeOutcome;
use fleet_types::app::{
    Anchor, AppMessage, AppSpecification, GossipMessage, HashRecord, LocationRecord,
    PeerSyncStatus,
};
use fleet_types::Height;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::{BoxError, ServiceBuilder};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

const MAX_BATCH: usize = 1_000;
const BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

// --- Error Handling ---
pub enum AdminError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl<E> From<E> for AdminError
where
    E: Into<anyhow::Error>,
{
    fn from(e: E) -> Self {
        Self::Internal(e.into())
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, msg, code) = match self {
            AdminError::BadRequest(s) => (StatusCode::BAD_REQUEST, s, "INVALID_REQUEST"),
            AdminError::NotFound(s) => (StatusCode::NOT_FOUND, s, "NOT_FOUND"),
            AdminError::Internal(e) => {
                tracing::error!(target: "node", error = ?e, "admin request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };
        (
            status,
            Json(serde_json::json!({ "error": {"code": code, "message": msg} })),
        )
            .into_response()
    }
}

// --- Background Tasks ---

/// Progress of a task started through an admin route.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    /// Still running.
    Running,
    /// Finished with a report.
    Finished {
        /// Operation-specific summary.
        report: serde_json::Value,
    },
    /// Failed.
    Failed {
        /// Error text.
        error: String,
    },
}

/// A task started through an admin route.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    /// Task id handed out in the `202` response.
    pub id: String,
    /// Operation name.
    pub kind: &'static str,
    /// Current state.
    #[serde(flatten)]
    pub state: TaskState,
}

#[derive(Debug, Serialize, Deserialize)]
struct Accepted {
    task_id: String,
}

/// Shared state of the router.
pub struct AdminState {
    node: Arc<FleetNode>,
    tasks: Arc<Mutex<LruCache<String, TaskRecord>>>,
}

impl AdminState {
    fn spawn_task<F, T, E>(&self, kind: &'static str, job: F) -> String
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: Display + Send + 'static,
    {
        let id = Uuid::new_v4().to_string();
        self.tasks.lock().put(
            id.clone(),
            TaskRecord {
                id: id.clone(),
                kind,
                state: TaskState::Running,
            },
        );
        tracing::info!(target: "node", task = kind, id = %id, "admin task started");
        let tasks = self.tasks.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let state = match job.await {
                Ok(report) => {
                    tracing::info!(target: "node", task = kind, id = %task_id, "admin task finished");
                    TaskState::Finished {
                        report: serde_json::to_value(report).unwrap_or_default(),
                    }
                }
                Err(e) => {
                    tracing::error!(target: "node", task = kind, id = %task_id, error = %e, "admin task failed");
                    TaskState::Failed {
                        error: e.to_string(),
                    }
                }
            };
            if let Some(record) = tasks.lock().peek_mut(&task_id) {
                record.state = state;
            }
        });
        id
    }

    fn fresh_since(&self) -> u64 {
        self.node
            .collaborators
            .clock
            .now_ms()
            .saturating_sub(self.node.config.sync.temporary_message_ttl_ms())
    }
}

fn accepted(task_id: String) -> (StatusCode, Json<Accepted>) {
    (StatusCode::ACCEPTED, Json(Accepted { task_id }))
}

// --- Admin Handlers ---

async fn reindex(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let projector = state.node.projector.clone();
    accepted(state.spawn_task("reindex", async move { projector.rebuild(0, true).await }))
}

#[derive(Debug, Deserialize)]
struct RescanParams {
    from_height: Height,
    #[serde(default)]
    purge: bool,
}

async fn rescan(
    State(state): State<Arc<AdminState>>,
    Query(params): Query<RescanParams>,
) -> impl IntoResponse {
    let projector = state.node.projector.clone();
    accepted(state.spawn_task("rescan", async move {
        projector.rebuild(params.from_height, params.purge).await
    }))
}

async fn force_sync(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let engine = state.node.engine.clone();
    accepted(state.spawn_task("sync", async move { engine.sweep_missing(true).await }))
}

async fn reconcile(State(state): State<Arc<AdminState>>) -> impl IntoResponse {
    let engine = state.node.engine.clone();
    accepted(state.spawn_task("reconcile", async move { engine.reconcile() }))
}

async fn task_status(
    State(state): State<Arc<AdminState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, AdminError> {
    state
        .tasks
        .lock()
        .peek(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AdminError::NotFound(format!("no task {id}")))
}

async fn hashes(State(state): State<Arc<AdminState>>) -> Result<Json<Vec<HashRecord>>, AdminError> {
    Ok(Json(state.node.collections.hash_records()?))
}

async fn locations(
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<LocationRecord>>, AdminError> {
    Ok(Json(state.node.locations.all_running()?))
}

async fn locations_of(
    State(state): State<Arc<AdminState>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<LocationRecord>>, AdminError> {
    Ok(Json(state.node.locations.running(&name)?))
}

async fn registry(
    State(state): State<Arc<AdminState>>,
) -> Result<Json<Vec<AppSpecification>>, AdminError> {
    Ok(Json(state.node.collections.registry_rows()?))
}

async fn registry_row(
    State(state): State<Arc<AdminState>>,
    Path(name): Path<String>,
) -> Result<Json<AppSpecification>, AdminError> {
    state
        .node
        .collections
        .registry_row(&name)?
        .map(Json)
        .ok_or_else(|| AdminError::NotFound(format!("no registered app {name}")))
}

// --- Peer Handlers ---

#[derive(Debug, Serialize, Deserialize)]
struct GossipAck {
    kind: String,
    accepted: bool,
}

async fn gossip(
    State(state): State<Arc<AdminState>>,
    Json(message): Json<GossipMessage>,
) -> Result<Json<GossipAck>, AdminError> {
    let kind = message.kind();
    let node = &state.node;
    let accepted = match message {
        GossipMessage::AppMessage(m) => {
            node.engine.intake_temporary(m).await? == IntakeOutcome::Stored
        }
        GossipMessage::AppRunning(r) => node.locations.on_running(r)?,
        GossipMessage::AppInstalling(a) => node.locations.on_installing(a)?,
        GossipMessage::AppInstallError(e) => node.locations.on_install_error(e)?,
        GossipMessage::AppRemoved(n) => node.locations.on_removed(n)?,
    };
    Ok(Json(GossipAck {
        kind: kind.to_string(),
        accepted,
    }))
}

async fn anchor(
    State(state): State<Arc<AdminState>>,
    Json(anchor): Json<Anchor>,
) -> impl IntoResponse {
    let engine = state.node.engine.clone();
    accepted(state.spawn_task("anchor", async move { engine.record_anchor(anchor).await }))
}

async fn message(
    State(state): State<Arc<AdminState>>,
    Path(hash): Path<String>,
) -> Result<Json<AppMessage>, AdminError> {
    let collections = &state.node.collections;
    if let Some(stored) = collections.permanent_message(&hash)? {
        return Ok(Json(stored.message));
    }
    collections
        .temporary_message(&hash, state.fresh_since())?
        .map(|t| Json(t.message))
        .ok_or_else(|| AdminError::NotFound(format!("no message {hash}")))
}

async fn message_batch(
    State(state): State<Arc<AdminState>>,
    Json(hashes): Json<Vec<String>>,
) -> Result<Json<Vec<AppMessage>>, AdminError> {
    if hashes.len() > MAX_BATCH {
        return Err(AdminError::BadRequest(format!(
            "at most {MAX_BATCH} hashes per batch"
        )));
    }
    let collections = &state.node.collections;
    let mut found = Vec::new();
    let mut rest = Vec::new();
    for hash in hashes {
        match collections.permanent_message(&hash)? {
            Some(stored) => found.push(stored.message),
            None => rest.push(hash),
        }
    }
    if !rest.is_empty() {
        found.extend(
            collections
                .temporary_messages_for(&rest, state.fresh_since())?
                .into_iter()
                .map(|t| t.message),
        );
    }
    Ok(Json(found))
}

async fn sync_status(
    State(state): State<Arc<AdminState>>,
) -> Result<Json<PeerSyncStatus>, AdminError> {
    Ok(Json(state.node.engine.self_status().await?))
}

async fn export(State(state): State<Arc<AdminState>>) -> Result<Json<Vec<AppMessage>>, AdminError> {
    Ok(Json(state.node.collections.permanent_messages()?))
}

async fn map_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(serde_json::json!({
                "error": {"code": "TIMEOUT", "message": "Request timed out"}
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "error": {"code": "UNAVAILABLE", "message": err.to_string()}
            })),
        )
    }
}

/// The admin and peer router over `node`.
pub fn router(node: Arc<FleetNode>) -> Router {
    let history = NonZeroUsize::new(node.config.network.task_history).unwrap_or(NonZeroUsize::MIN);
    let state = Arc::new(AdminState {
        node,
        tasks: Arc::new(Mutex::new(LruCache::new(history))),
    });

    let bounded = Router::new()
        .route("/admin/reindex", post(reindex))
        .route("/admin/rescan", post(rescan))
        .route("/admin/sync", post(force_sync))
        .route("/admin/reconcile", post(reconcile))
        .route("/admin/tasks/:id", get(task_status))
        .route("/hashes", get(hashes))
        .route("/locations", get(locations))
        .route("/locations/:name", get(locations_of))
        .route("/registry", get(registry))
        .route("/registry/:name", get(registry_row))
        .route("/gossip", post(gossip))
        .route("/anchors", post(anchor))
        .route("/messages/batch", post(message_batch))
        .route("/messages/:hash", get(message))
        .route("/sync/status", get(sync_status))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(map_middleware_error))
                .load_shed()
                .concurrency_limit(64)
                .timeout(Duration::from_secs(30)),
        );
    // The export is large and slow by nature, so it sits outside the timeout.
    let unbounded = Router::new().route("/sync/export", get(export));

    bounded
        .merge(unbounded)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

/// Serves [`router`] until `shutdown` flips to `true`.
pub async fn run_server(
    addr: SocketAddr,
    node: Arc<FleetNode>,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(target: "node", error = %e, "failed to bind admin http server");
            return;
        }
    };
    if let Ok(local) = listener.local_addr() {
        tracing::info!(target: "node", addr = %local, "admin http server listening");
    }
    let graceful = axum::serve(listener, router(node).into_make_service()).with_graceful_shutdown(
        async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
            tracing::info!(target: "node", "admin http server shutting down");
        },
    );
    if let Err(e) = graceful.await {
        tracing::error!(target: "node", error = %e, "admin http server error");
    }
}
