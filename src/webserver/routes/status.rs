use axum::{extract::State, response::Response, routing::get, Router};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    arguments::is_debug_webserver_enabled,
    logger::{self, LogTag},
    relay::RelayStatus,
    services::{get_services_health, overall_status, ServiceHealth},
    webserver::{state::AppState, utils::success_response},
};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "ok", "degraded", "unhealthy" or "starting"
    pub status: String,
    pub services: BTreeMap<&'static str, ServiceHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

/// Relay snapshot plus server figures
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub relay: RelayStatus,
    pub ws_connections: usize,
    pub uptime_seconds: u64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StatusResponse {
    pub async fn gather(state: &AppState) -> Self {
        Self {
            relay: state.relay.status().await,
            ws_connections: state.ws_connection_count().await,
            uptime_seconds: state.uptime_seconds(),
            timestamp: Utc::now(),
        }
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(relay_status))
}

/// GET /api/health
async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let health = get_services_health(&state.services).await;
    let status = overall_status(&health);

    if status != "ok" && is_debug_webserver_enabled() {
        logger::debug(LogTag::Webserver, &format!("Health check: {}", status));
    }

    success_response(HealthResponse {
        status: status.to_string(),
        services: health.into_iter().collect(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/status
async fn relay_status(State(state): State<Arc<AppState>>) -> Response {
    let snapshot = StatusResponse::gather(&state).await;

    if is_debug_webserver_enabled() {
        logger::debug(
            LogTag::Webserver,
            &format!(
                "Status snapshot (state={}, retries={}/{}, observers={})",
                snapshot.relay.state,
                snapshot.relay.retry_count,
                snapshot.relay.max_retries,
                snapshot.relay.observers
            ),
        );
    }

    success_response(snapshot)
}
