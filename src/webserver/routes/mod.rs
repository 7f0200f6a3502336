use crate::webserver::{state::AppState, ws};
use axum::{routing::get, Router};
use std::sync::Arc;

pub mod relay;
pub mod status;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws::ws_upgrade))
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api", api_routes())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(status::routes())
        .merge(relay::routes())
}
