//! Axum-based status API
//!
//! Read-only view of the controller: liveness, the latest published status,
//! recent cycle reports and the effective configuration.

use crate::config::Config;
use crate::controller::{ControllerStatus, ReportHistory};
use crate::error::{ChargerError, Result};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub status_rx: watch::Receiver<Arc<ControllerStatus>>,
    pub history: ReportHistory,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": env!("APP_VERSION"),
        })),
    )
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let current = state.status_rx.borrow().clone();
    Json(ControllerStatus::clone(&current))
}

pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(state.history.capacity());
    Json(state.history.recent(limit).await)
}

pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.redacted())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/history", get(history))
        .route("/api/config", get(get_config))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the status API until `shutdown` resolves
pub async fn serve<F>(state: AppState, host: &str, port: u16, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);
    let logger = crate::logging::get_logger("web");

    let addr = match host.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port),
        Err(_) => {
            logger.warn(&format!(
                "Invalid host '{}'; falling back to 127.0.0.1",
                host
            ));
            SocketAddr::from(([127, 0, 0, 1], port))
        }
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ChargerError::web(format!("Failed to bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| ChargerError::web(e.to_string()))?;
    logger.info(&format!(
        "Status API listening at http://{}:{}/api",
        local_addr.ip(),
        local_addr.port()
    ));

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ChargerError::web(format!("Server error: {}", e)))?;
    logger.info("Status API stopped");
    Ok(())
}
