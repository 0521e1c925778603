use std::sync::Arc;
use std::time::Duration;

use integrisense_events::BroadcastHub;
use tokio_util::sync::CancellationToken;

/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a background task that queues a Ping frame for every live
/// subscriber each `interval`, until `cancel` fires.
pub fn start_heartbeat(
    hub: Arc<BroadcastHub>,
    interval: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let count = hub.subscriber_count().await;
                    tracing::debug!(count, "WebSocket heartbeat ping");
                    hub.ping_all().await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use integrisense_events::Outbound;

    use super::*;

    #[tokio::test]
    async fn pings_subscribers_until_cancelled() {
        let hub = Arc::new(BroadcastHub::new(16));
        let mut sub = hub.subscribe().await;
        while sub.receiver.try_recv().is_ok() {}

        let cancel = CancellationToken::new();
        let handle = start_heartbeat(hub.clone(), Duration::from_millis(5), cancel.clone());

        let first = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(Outbound::Ping));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
