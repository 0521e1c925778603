//! In-process result bus backed by a `tokio::sync::broadcast` channel.
//!
//! Every classification is published here in addition to the live hub, so
//! background consumers (the record store) see the same stream without
//! registering as live subscribers.

use integrisense_core::classification::ClassificationResult;
use tokio::sync::broadcast;

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

pub struct ResultBus {
    sender: broadcast::Sender<ClassificationResult>,
}

impl ResultBus {
    /// When the buffer is full the oldest results are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current receivers. Dropped silently when there are none.
    pub fn publish(&self, result: ClassificationResult) {
        let _ = self.sender.send(result);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClassificationResult> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ResultBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use integrisense_core::classification::ClassificationLabel;
    use integrisense_core::reading::{Motion, Reading, ReadingSource};

    fn result() -> ClassificationResult {
        ClassificationResult::guarded(
            Reading {
                bvp: 0.5,
                temperature: 34.0,
                eda: 1.0,
                motion: Motion::Absent,
                source: ReadingSource::Synthetic,
            }
            .canonicalize(Utc::now()),
        )
    }

    #[tokio::test]
    async fn every_receiver_gets_the_result() {
        let bus = ResultBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(result());

        assert_eq!(rx1.recv().await.unwrap().label, ClassificationLabel::Calm);
        assert_eq!(rx2.recv().await.unwrap().label, ClassificationLabel::Calm);
    }

    #[test]
    fn publish_with_no_receivers_does_not_panic() {
        let bus = ResultBus::default();
        bus.publish(result());
        assert_eq!(bus.receiver_count(), 0);
    }
}
