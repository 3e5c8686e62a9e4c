//! HTTP server for harvester status and metrics.
//!
//! Provides endpoints for:
//! - Liveness
//! - Feeder queue depth and the state of all 24 cycle workers
//! - Prometheus metrics

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use ingestion::{CycleStatus, Feeder, StatusBoard, WorkerState};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub status: String,
    pub feeder_running: bool,
    pub queue_depth: usize,
    pub cycles_polling: usize,
    pub cycles: Vec<CycleStatus>,
}

// ============================================================================
// Shared State
// ============================================================================

pub struct ServerState {
    pub feeder: Arc<Feeder>,
    pub cycles: StatusBoard,
    pub prometheus: PrometheusHandle,
}

// ============================================================================
// Router
// ============================================================================

/// Create the status API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn build_status(state: &ServerState) -> StatusResponse {
    let cycles = state.cycles.snapshot();
    let cycles_polling = cycles
        .iter()
        .filter(|cycle| cycle.state == WorkerState::Polling)
        .count();
    let feeder_running = state.feeder.is_running().await;
    let queue_depth = state.feeder.pending();

    let status = if !feeder_running {
        "stopped"
    } else if queue_depth > 0 {
        "feeding"
    } else {
        "idle"
    };

    StatusResponse {
        service: "harvester".to_string(),
        status: status.to_string(),
        feeder_running,
        queue_depth,
        cycles_polling,
        cycles,
    }
}

/// GET /status - Feeder and cycle worker status
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    Json(build_status(&state).await)
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> impl IntoResponse {
    state.prometheus.render()
}

/// GET /health - Health check
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

// ============================================================================
// Server
// ============================================================================

/// Run the status server until the process exits.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting harvester status server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
