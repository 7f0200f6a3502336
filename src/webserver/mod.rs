//! Downstream server
//!
//! Observers connect over websocket (`/` or `/ws`); operators poll
//! `/api/status` and drive the relay with `/api/relay/start|stop`.

mod server;

pub mod routes;
pub mod state;
pub mod utils;
pub mod ws;

pub use server::{bind_listener, build_app, serve};
pub use state::AppState;
