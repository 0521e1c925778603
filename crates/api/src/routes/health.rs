use axum::extract::State;
use axum::{routing::get, Json, Router};
use integrisense_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: &'static str,
    pub model_loaded: bool,
    /// Version of the active model artifact, if any.
    pub model_version: Option<u64>,
    pub serial_connected: bool,
    /// Live subscriber count.
    pub subscribers: usize,
    pub timestamp: Timestamp,
}

/// GET /health -- model and device availability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model = state.lifecycle.slot().metadata();

    Json(HealthResponse {
        status: "healthy",
        model_loaded: model.is_some(),
        model_version: model.map(|m| m.version),
        serial_connected: state.device.is_connected(),
        subscribers: state.hub.subscriber_count().await,
        timestamp: chrono::Utc::now(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
