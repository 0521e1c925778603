//! Drains readings decoded by the device read loop into the pipeline.

use integrisense_core::reading::CanonicalReading;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::pipeline::Pipeline;

/// Run until `cancel` fires or every reading sender is gone.
pub async fn run(
    pipeline: Pipeline,
    mut readings: mpsc::Receiver<CanonicalReading>,
    cancel: CancellationToken,
) {
    tracing::info!("Device reading consumer started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Device reading consumer stopping");
                break;
            }
            next = readings.recv() => match next {
                Some(reading) => {
                    pipeline.process(reading).await;
                }
                None => {
                    tracing::info!("Device reading channel closed");
                    break;
                }
            },
        }
    }
}
