//! WebSocket surface for live container logs.
//!
//! ### Outbound (server -> client)
//! - `{"event":"log","data":...}` - one per log chunk
//! - `{"event":"diagnostic","data":...}` - final frame (stream ended or failed)
//!
//! Inbound messages are ignored.

pub mod handler;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::logs::LogBroker;

pub fn ws_router(broker: Arc<LogBroker>) -> Router {
    Router::new()
        .route("/ws/logs", get(handler::ws_handler))
        .with_state(broker)
}
