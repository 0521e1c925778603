pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the route tree. Mounted at the root and under `/api`.
///
/// ```text
/// /health                 service health (GET)
/// /sensor-data            network ingestion (POST)
/// /test-data              synthetic reading through the pipeline (POST)
///
/// /serial/status          device state, ports, platform (GET)
/// /serial/configure       partial device reconfiguration (POST)
/// /serial/send            write a command line to the device (POST)
///
/// /model                  active model metadata (GET)
/// /model/reload           reload the artifact from disk (POST)
///
/// /ws                     live subscription channel
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .route("/sensor-data", post(handlers::ingest::receive_sensor_data))
        .route("/test-data", post(handlers::ingest::generate_test_data))
        .route("/serial/status", get(handlers::serial::get_status))
        .route("/serial/configure", post(handlers::serial::configure))
        .route("/serial/send", post(handlers::serial::send_command))
        .route("/model", get(handlers::model::get_model))
        .route("/model/reload", post(handlers::model::reload_model))
        .route("/ws", get(ws::ws_handler))
}
