//! Startup wiring and ordered shutdown of every long-lived component.

use std::sync::Arc;
use std::time::Duration;

use integrisense_classifier::{
    ClassificationEngine, ClassifierSlot, JsonlInboxSource, ModelLifecycleManager,
};
use integrisense_core::normalize::ReadingNormalizer;
use integrisense_device::transport::TransportFactory;
use integrisense_device::DeviceManager;
use integrisense_events::{BroadcastHub, JsonlRecordSink, RecordPersistence, ResultBus};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::background::{device_events, device_readings};
use crate::config::ServerConfig;
use crate::pipeline::Pipeline;
use crate::state::AppState;
use crate::ws;

/// Queue depth between the device read loop and the pipeline.
const READING_CHANNEL_CAPACITY: usize = 256;

/// How long shutdown waits for each background task.
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Running application: shared state plus the background tasks behind it.
pub struct Services {
    pub state: AppState,
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    persistence: Option<JoinHandle<()>>,
}

impl Services {
    /// Build every component, load the model, spawn background tasks and
    /// start the device link.
    ///
    /// Nothing here is fatal: a missing model, an unopenable record store or
    /// an absent device are logged and the server still comes up.
    pub async fn start(config: ServerConfig, factory: Arc<dyn TransportFactory>) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        // --- Classification ---
        let slot = Arc::new(ClassifierSlot::new());
        let source = Arc::new(JsonlInboxSource::new(config.training_inbox_path.clone()));
        let lifecycle = Arc::new(ModelLifecycleManager::new(
            Arc::clone(&slot),
            config.model_path.clone(),
            source,
        ));
        lifecycle.load_at_startup().await;
        let engine = ClassificationEngine::new(config.guard, slot);

        // --- Distribution ---
        let hub = Arc::new(BroadcastHub::new(config.subscriber_buffer));
        let result_bus = Arc::new(ResultBus::default());
        let persistence = match &config.record_store_path {
            Some(path) => match JsonlRecordSink::open(path.clone()).await {
                Ok(sink) => {
                    tracing::info!(path = %path.display(), "Record store enabled");
                    Some(tokio::spawn(RecordPersistence::run(
                        Arc::new(sink),
                        result_bus.subscribe(),
                    )))
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Record store unavailable, persistence disabled");
                    None
                }
            },
            None => None,
        };
        let pipeline = Pipeline::new(engine, Arc::clone(&hub), result_bus);

        // --- Device ---
        let normalizer = ReadingNormalizer::new(config.line_layout.clone());
        let (readings_tx, readings_rx) = mpsc::channel(READING_CHANNEL_CAPACITY);
        let device = DeviceManager::new(
            config.device.clone(),
            factory,
            normalizer.clone(),
            readings_tx,
        );

        tasks.push((
            "device readings",
            tokio::spawn(device_readings::run(
                pipeline.clone(),
                readings_rx,
                cancel.child_token(),
            )),
        ));
        tasks.push((
            "device events",
            tokio::spawn(device_events::run(
                Arc::clone(&hub),
                device.subscribe(),
                cancel.child_token(),
            )),
        ));
        tasks.push((
            "heartbeat",
            ws::start_heartbeat(
                Arc::clone(&hub),
                ws::HEARTBEAT_INTERVAL,
                cancel.child_token(),
            ),
        ));
        if let Some(interval) = config.retrain_interval() {
            tasks.push((
                "retrain",
                lifecycle.schedule_retrain(interval, cancel.child_token()),
            ));
        } else {
            tracing::info!("Retraining disabled");
        }

        if let Err(e) = device.start().await {
            tracing::warn!(error = %e, "Device not available at startup, will keep retrying");
        }

        let state = AppState {
            config: Arc::new(config),
            device,
            pipeline,
            lifecycle,
            hub,
            normalizer,
        };

        Self {
            state,
            cancel,
            tasks,
            persistence,
        }
    }

    /// Stop the device, background tasks and live subscribers, in that
    /// order. The record store drains once the last result bus handle is
    /// dropped here.
    pub async fn shutdown(self) {
        let Self {
            state,
            cancel,
            tasks,
            persistence,
        } = self;

        state.device.shutdown().await;
        tracing::info!("Device manager shut down");

        cancel.cancel();
        for (name, handle) in tasks {
            if tokio::time::timeout(TASK_STOP_TIMEOUT, handle).await.is_err() {
                tracing::warn!(task = name, "Background task did not stop in time");
            }
        }
        tracing::info!("Background tasks stopped");

        let hub = Arc::clone(&state.hub);
        drop(state);
        if let Some(handle) = persistence {
            let _ = tokio::time::timeout(TASK_STOP_TIMEOUT, handle).await;
            tracing::info!("Record persistence stopped");
        }

        let subscribers = hub.subscriber_count().await;
        tracing::info!(subscribers, "Closing remaining live subscribers");
        hub.shutdown_all().await;
    }
}
