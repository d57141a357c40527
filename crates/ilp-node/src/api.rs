//! HTTP server for the connector.
//!
//! Peers deliver Prepare packets with ILP-over-HTTP on `/ilp` and exchange
//! route broadcasts on `/ccp/*`. `/routes` and `/health` are for operators.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ilp_core::{PeerInfo, Prepare};
use ilp_routing::{RouteControlRequest, RouteUpdateRequest, UpdateOutcome};
use serde::Serialize;
use std::sync::Arc;

use crate::ccp::{CONTROL_PATH, UPDATE_PATH};
use crate::state::NodeState;

const OCTET_STREAM: &str = "application/octet-stream";

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub version: String,
    pub ilp_address: String,
    pub peer_count: usize,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn authenticate(state: &NodeState, headers: &HeaderMap) -> Result<Arc<PeerInfo>, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "missing bearer token"))?;
    state
        .authenticate(token)
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "unknown bearer token"))
}

// --- Handlers ---

async fn handle_ilp(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(OCTET_STREAM) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("expected content type {OCTET_STREAM}"),
        ));
    }
    let peer = authenticate(&state, &headers)?;
    let prepare = Prepare::from_bytes(&body)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("invalid prepare packet: {e}")))?;

    let reply = state.pipeline.process(prepare, peer).await;
    Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], reply.to_bytes()).into_response())
}

async fn handle_route_control(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(request): Json<RouteControlRequest>,
) -> Result<StatusCode, ApiError> {
    let peer = authenticate(&state, &headers)?;
    if !state.handle_route_control(&peer.id, &request) {
        return Err(api_error(
            StatusCode::FORBIDDEN,
            format!("routes are not broadcast to peer {}", peer.id),
        ));
    }
    tracing::debug!(peer_id = %peer.id, mode = ?request.mode, "route control request applied");
    Ok(StatusCode::NO_CONTENT)
}

async fn handle_route_update(
    State(state): State<Arc<NodeState>>,
    headers: HeaderMap,
    Json(request): Json<RouteUpdateRequest>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let peer = authenticate(&state, &headers)?;
    let outcome = state
        .handle_route_update(&peer.id, &request)
        .ok_or_else(|| {
            api_error(
                StatusCode::FORBIDDEN,
                format!("routes are not accepted from peer {}", peer.id),
            )
        })?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if outcome.needs_route_control() {
        let state = state.clone();
        let peer_id = peer.id.clone();
        tokio::spawn(async move {
            if let Err(e) = crate::node::request_routes(&state, &peer_id).await {
                tracing::warn!(peer_id = %peer_id, error = %e, "route control request failed");
            }
        });
    }
    Ok(Json(outcome))
}

async fn handle_routes(State(state): State<Arc<NodeState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let table = serde_json::to_value(state.routes.read().router().routing_table());
    table
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

async fn handle_health(State(state): State<Arc<NodeState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        ilp_address: state.own_address.to_string(),
        peer_count: state.peer_count(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/ilp", post(handle_ilp))
        .route(CONTROL_PATH, post(handle_route_control))
        .route(UPDATE_PATH, post(handle_route_update))
        .route("/routes", get(handle_routes))
        .route("/health", get(handle_health))
        .with_state(state)
}

/// Serve the API on an already bound listener.
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<NodeState>) -> anyhow::Result<()> {
    let app = build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}
