//! The shared classify-and-distribute path.
//!
//! Both producers, the device read loop and network ingestion, hand their
//! canonical readings to [`Pipeline::process`]. It is cheap to clone and safe
//! to call concurrently.

use std::sync::Arc;

use integrisense_classifier::ClassificationEngine;
use integrisense_core::classification::ClassificationResult;
use integrisense_core::reading::CanonicalReading;
use integrisense_events::{BroadcastHub, ResultBus};

#[derive(Clone)]
pub struct Pipeline {
    engine: ClassificationEngine,
    hub: Arc<BroadcastHub>,
    results: Arc<ResultBus>,
}

impl Pipeline {
    pub fn new(
        engine: ClassificationEngine,
        hub: Arc<BroadcastHub>,
        results: Arc<ResultBus>,
    ) -> Self {
        Self {
            engine,
            hub,
            results,
        }
    }

    pub fn engine(&self) -> &ClassificationEngine {
        &self.engine
    }

    /// Classify one reading, fan it out to live subscribers and publish it
    /// on the result bus. Always yields a labelled result.
    pub async fn process(&self, reading: CanonicalReading) -> ClassificationResult {
        let result = self.engine.classify(reading);

        let delivered = self.hub.publish(&result).await;
        tracing::debug!(
            label = %result.label,
            source = %result.reading.source(),
            delivered,
            "Reading classified"
        );

        self.results.publish(result);
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use integrisense_classifier::ClassifierSlot;
    use integrisense_core::classification::ClassificationLabel;
    use integrisense_core::guard::GuardPolicy;
    use integrisense_core::reading::{Motion, Reading, ReadingSource};

    use super::*;

    #[tokio::test]
    async fn process_publishes_to_hub_and_bus() {
        let hub = Arc::new(BroadcastHub::new(8));
        let bus = Arc::new(ResultBus::new(8));
        let mut bus_rx = bus.subscribe();
        let mut sub = hub.subscribe().await;
        while sub.receiver.try_recv().is_ok() {}

        let pipeline = Pipeline::new(
            ClassificationEngine::new(GuardPolicy::default(), Arc::new(ClassifierSlot::new())),
            hub,
            bus,
        );

        let reading = Reading {
            bvp: 1.0,
            temperature: 34.0,
            eda: 2.0,
            motion: Motion::Absent,
            source: ReadingSource::Network,
        }
        .canonicalize(Utc::now());

        let result = pipeline.process(reading).await;
        assert_eq!(result.label, ClassificationLabel::Calm);
        assert_eq!(bus_rx.try_recv().unwrap().label, ClassificationLabel::Calm);
        assert!(sub.receiver.try_recv().is_ok());
    }
}
