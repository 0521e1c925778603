//! Record persistence service.
//!
//! [`RecordPersistence`] subscribes to the [`ResultBus`](crate::bus::ResultBus)
//! and appends every classified reading to a [`RecordSink`]. It runs as a
//! long-lived background task and exits when the bus is dropped.

use std::sync::Arc;

use integrisense_core::classification::ClassificationResult;
use tokio::sync::broadcast;

use crate::sink::RecordSink;

pub struct RecordPersistence;

impl RecordPersistence {
    /// Run the persistence loop. Failures are logged and never reach the
    /// ingestion path.
    pub async fn run(
        sink: Arc<dyn RecordSink>,
        mut receiver: broadcast::Receiver<ClassificationResult>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(result) => {
                    if let Err(e) = sink.append(&result.payload()).await {
                        tracing::error!(
                            error = %e,
                            label = %result.label,
                            "Failed to persist classified reading"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Record persistence lagged, some readings were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Result bus closed, record persistence shutting down");
                    break;
                }
            }
        }
    }
}
