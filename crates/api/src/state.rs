use std::sync::Arc;

use integrisense_classifier::ModelLifecycleManager;
use integrisense_core::normalize::ReadingNormalizer;
use integrisense_device::DeviceManager;
use integrisense_events::BroadcastHub;

use crate::config::ServerConfig;
use crate::pipeline::Pipeline;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Device link (serial wearable).
    pub device: Arc<DeviceManager>,
    /// Guard, classifier and fan-out for every reading.
    pub pipeline: Pipeline,
    /// Startup load, reload and retrain of the model artifact.
    pub lifecycle: Arc<ModelLifecycleManager>,
    /// Live subscriber registry (WebSocket clients).
    pub hub: Arc<BroadcastHub>,
    /// Boundary decoder for network payloads.
    pub normalizer: ReadingNormalizer,
}
