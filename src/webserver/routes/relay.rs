/// Admin controls for the relay
use axum::{extract::State, http::StatusCode, response::Response, routing::post, Router};
use serde::Serialize;
use std::sync::Arc;

use super::status::StatusResponse;
use crate::{
    logger::{self, LogTag},
    webserver::{
        state::AppState,
        utils::{error_response, success_response},
    },
};

#[derive(Debug, Serialize)]
struct StartResponse {
    /// False when a session was already running
    started: bool,
    #[serde(flatten)]
    status: StatusResponse,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/relay/start", post(start_relay))
        .route("/relay/stop", post(stop_relay))
}

/// POST /api/relay/start
async fn start_relay(State(state): State<Arc<AppState>>) -> Response {
    logger::info(LogTag::Webserver, "Relay start requested via API");

    match state.relay.start().await {
        Ok(started) => success_response(StartResponse {
            started,
            status: StatusResponse::gather(&state).await,
        }),
        Err(e) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "RELAY_UNAVAILABLE",
            &e.to_string(),
        ),
    }
}

/// POST /api/relay/stop
async fn stop_relay(State(state): State<Arc<AppState>>) -> Response {
    logger::info(LogTag::Webserver, "Relay stop requested via API");

    match state.relay.stop().await {
        Ok(()) => success_response(StatusResponse::gather(&state).await),
        Err(e) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "RELAY_UNAVAILABLE",
            &e.to_string(),
        ),
    }
}
