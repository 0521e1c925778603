//! Relays device lifecycle events to live subscribers.
//!
//! Every state transition goes out as `serial_status`; presence edges
//! (a transport opened or closed) additionally go out as `esp32_status`.

use std::sync::Arc;

use integrisense_device::DeviceEvent;
use integrisense_events::{BroadcastHub, LiveEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Map a device event onto the live event subscribers see.
pub fn to_live_event(event: &DeviceEvent) -> LiveEvent {
    match event {
        DeviceEvent::StateChanged(state) => LiveEvent::serial_status(state),
        DeviceEvent::Linked { port } => LiveEvent::esp32_status(true, port),
        DeviceEvent::Unlinked { port, .. } => LiveEvent::esp32_status(false, port),
    }
}

pub async fn run(
    hub: Arc<BroadcastHub>,
    mut events: broadcast::Receiver<DeviceEvent>,
    cancel: CancellationToken,
) {
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => received,
        };

        match received {
            Ok(event) => {
                if let DeviceEvent::Unlinked { port, reason } = &event {
                    tracing::warn!(port = %port, reason = %reason, "Device unlinked");
                }
                hub.broadcast_event(&to_live_event(&event)).await;
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Device event relay lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::info!("Device event relay stopped");
}
