//! Diagnostic routes

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::container::{ContainerStatus, LifecycleManager};
use crate::logs::{LogBroker, LogObserver};

#[derive(Clone)]
pub struct PublicState {
    pub lifecycle: Arc<LifecycleManager>,
    pub broker: Arc<LogBroker>,
}

#[derive(Serialize)]
struct PingResponse {
    status: String,
    version: String,
    container: ContainerStatus,
    log_observers: Vec<LogObserver>,
}

pub fn public_router(lifecycle: Arc<LifecycleManager>, broker: Arc<LogBroker>) -> Router {
    Router::new()
        .route("/", get(ping))
        .with_state(PublicState { lifecycle, broker })
}

async fn ping(State(state): State<PublicState>) -> Response {
    let container = state
        .lifecycle
        .status()
        .await
        .unwrap_or(ContainerStatus::Unknown);

    (StatusCode::OK, Json(PingResponse {
        status: "Backend is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        container,
        log_observers: state.broker.observers(),
    })).into_response()
}
