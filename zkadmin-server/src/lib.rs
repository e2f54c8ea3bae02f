//! HTTP API for the zkadmin control plane.
//!
//! Routes map one to one onto [`AdminService`] operations. Connection-state
//! changes are streamed as Server-Sent Events on `/api/v1/events`.

mod dto;
mod error;

pub use dto::*;
pub use error::{status_for, ApiError};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::{delete, get, post, put},
    Router,
};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use zkadmin_core::{AdminService, BroadcastSink};
use zkadmin_types::{ClusterRegistration, PathData, PathNode};

/// Shared state behind every route.
pub struct AppState {
    pub service: AdminService,
    pub events: BroadcastSink,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// `events` must be the sink the service publishes to.
    pub fn new(service: AdminService, events: BroadcastSink) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            service,
            events,
            shutdown,
        }
    }

    /// Ends every open event stream so that graceful shutdown can finish.
    pub fn begin_shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ── Registrations ────────────────────────────────────────────────

async fn list_clusters(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ClusterRegistration>>> {
    Ok(Json(state.service.list_all().await?))
}

async fn register_cluster(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ClusterRegistration>)> {
    let registration = state
        .service
        .save_zk_info(req.alias.as_deref(), req.hosts.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

async fn delete_cluster(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_zk_info_by_alias(Some(&alias)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reconnect_cluster(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.reconnect_zk(Some(&alias)).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn update_state_by_alias(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Json(req): Json<ConnStateRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    let updated = state
        .service
        .update_conn_state_by_alias(Some(&alias), req.conn_state)
        .await?;
    Ok(Json(UpdatedResponse {
        updated: usize::from(updated),
    }))
}

async fn update_state_by_hosts(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnStateRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    let updated = state
        .service
        .update_conn_state_by_hosts(req.hosts.as_deref(), req.conn_state)
        .await?;
    Ok(Json(UpdatedResponse { updated }))
}

// ── Tree ─────────────────────────────────────────────────────────

async fn list_children(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<Vec<PathNode>>> {
    let nodes = state
        .service
        .list_zk_children_path(Some(&alias), query.path_id.as_deref())
        .await?;
    Ok(Json(nodes))
}

async fn get_data(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<Json<PathData>> {
    let data = state
        .service
        .get_path_data(Some(&alias), query.path_id.as_deref())
        .await?;
    Ok(Json(data))
}

async fn create_path(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Json(req): Json<CreatePathRequest>,
) -> ApiResult<(StatusCode, Json<PathIdResponse>)> {
    let path_id = state
        .service
        .create_path(
            Some(&alias),
            req.path_id.as_deref(),
            req.data.as_deref(),
            req.create_mode,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(PathIdResponse { path_id })))
}

async fn update_path(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Json(req): Json<UpdatePathRequest>,
) -> ApiResult<Json<PathIdResponse>> {
    let path_id = state
        .service
        .update_path(
            Some(&alias),
            req.new_id.as_deref(),
            req.old_id.as_deref(),
            req.data.as_deref(),
            req.version,
            req.create_mode,
        )
        .await?;
    Ok(Json(PathIdResponse { path_id }))
}

async fn delete_path(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Query(query): Query<PathQuery>,
) -> ApiResult<StatusCode> {
    state
        .service
        .delete_path(Some(&alias), query.path_id.as_deref(), query.version)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn copy_paste(
    State(state): State<Arc<AppState>>,
    Path(alias): Path<String>,
    Json(req): Json<CopyPasteRequest>,
) -> ApiResult<Json<CopyPasteResponse>> {
    let created = state
        .service
        .copy_paste_path(
            Some(&alias),
            req.copy.as_deref(),
            req.paste.as_deref(),
            req.new_base_name.as_deref(),
        )
        .await?;
    Ok(Json(CopyPasteResponse { created }))
}

// ── Events ───────────────────────────────────────────────────────

async fn events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = state.events.subscribe();
    let shutdown = state.shutdown.subscribe();
    debug!("event stream opened ({} subscribers)", state.events.subscriber_count());

    let stream = stream::unfold((receiver, shutdown), |(mut receiver, mut shutdown)| async move {
        loop {
            if *shutdown.borrow() {
                return None;
            }
            tokio::select! {
                received = receiver.recv() => match received {
                    Ok(notification) => {
                        let event = Event::default().event("state").json_data(&notification);
                        return Some((event, (receiver, shutdown)));
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("event stream lagged, {} notifications dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Build the HTTP API router over the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/clusters", get(list_clusters).post(register_cluster))
        .route("/api/v1/clusters/{alias}", delete(delete_cluster))
        .route("/api/v1/clusters/{alias}/reconnect", post(reconnect_cluster))
        .route("/api/v1/clusters/{alias}/conn-state", put(update_state_by_alias))
        .route("/api/v1/clusters/{alias}/children", get(list_children))
        .route("/api/v1/clusters/{alias}/data", get(get_data))
        .route(
            "/api/v1/clusters/{alias}/paths",
            post(create_path).put(update_path).delete(delete_path),
        )
        .route("/api/v1/clusters/{alias}/copy", post(copy_paste))
        .route("/api/v1/conn-state", put(update_state_by_hosts))
        .route("/api/v1/events", get(events))
        .with_state(state)
}
