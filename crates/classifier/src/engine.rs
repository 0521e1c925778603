//! Guard-then-model classification.
//!
//! Order matters, first match wins:
//! 1. every feature inside its guard interval -> `Calm`, model not consulted;
//! 2. no classifier loaded -> `ModelUnavailable`;
//! 3. scale, score, threshold at 0.5 -> `Stressed` / `Calm`;
//! any scaling or scoring failure -> `PredictionError`.

use std::sync::Arc;

use integrisense_core::classification::ClassificationResult;
use integrisense_core::guard::GuardPolicy;
use integrisense_core::reading::CanonicalReading;

use crate::handle::ClassifierSlot;

/// Classifies canonical readings. Safe to share across tasks.
#[derive(Debug, Clone)]
pub struct ClassificationEngine {
    guard: GuardPolicy,
    slot: Arc<ClassifierSlot>,
}

impl ClassificationEngine {
    pub fn new(guard: GuardPolicy, slot: Arc<ClassifierSlot>) -> Self {
        Self { guard, slot }
    }

    pub fn guard(&self) -> &GuardPolicy {
        &self.guard
    }

    pub fn slot(&self) -> &Arc<ClassifierSlot> {
        &self.slot
    }

    /// Always returns a result; failures are logged and labelled.
    pub fn classify(&self, reading: CanonicalReading) -> ClassificationResult {
        if self.guard.is_calm(&reading) {
            return ClassificationResult::guarded(reading);
        }

        let Some(handle) = self.slot.snapshot() else {
            return ClassificationResult::unavailable(reading);
        };

        match handle.predict(reading.features()) {
            Ok(score) => ClassificationResult::from_score(reading, score),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    model_version = handle.metadata().version,
                    "Prediction failed"
                );
                ClassificationResult::failed(reading)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{ClassifierHandle, ModelMetadata};
    use crate::model::{LogisticModel, Normalization};
    use chrono::Utc;
    use integrisense_core::classification::{ClassificationLabel, Decision};
    use integrisense_core::reading::{Motion, Reading, ReadingSource};

    fn reading(bvp: f64, temperature: f64, eda: f64, magnitude: f64) -> CanonicalReading {
        Reading {
            bvp,
            temperature,
            eda,
            motion: Motion::Magnitude(magnitude),
            source: ReadingSource::Network,
        }
        .canonicalize(Utc::now())
    }

    fn install(slot: &ClassifierSlot, weights: [f64; 4], bias: f64, normalization: Normalization) {
        slot.swap(ClassifierHandle::new(
            Arc::new(LogisticModel::new(weights, bias)),
            normalization,
            ModelMetadata {
                version: 1,
                trained_at: Utc::now(),
                samples: 2,
            },
        ));
    }

    #[test]
    fn guarded_reading_is_calm_without_a_model() {
        let engine = ClassificationEngine::new(GuardPolicy::default(), Arc::default());
        let result = engine.classify(reading(1.0, 34.0, 2.0, 0.0));
        assert_eq!(result.label, ClassificationLabel::Calm);
        assert_eq!(result.decision, Decision::Guard);
        assert_eq!(result.confidence, None);
    }

    #[test]
    fn guarded_reading_ignores_a_stress_biased_model() {
        let slot = Arc::new(ClassifierSlot::new());
        install(&slot, [0.0; 4], 50.0, Normalization::identity());
        let engine = ClassificationEngine::new(GuardPolicy::default(), slot);

        let result = engine.classify(reading(-2.0, 30.0, 0.0, 1.5));
        assert_eq!(result.label, ClassificationLabel::Calm);
        assert_eq!(result.decision, Decision::Guard);
    }

    #[test]
    fn outside_guard_without_model_is_unavailable() {
        let engine = ClassificationEngine::new(GuardPolicy::default(), Arc::default());
        let result = engine.classify(reading(0.1, 40.0, 10.0, 8.66));
        assert_eq!(result.label, ClassificationLabel::ModelUnavailable);
    }

    #[test]
    fn model_score_is_thresholded() {
        let slot = Arc::new(ClassifierSlot::new());
        let engine = ClassificationEngine::new(GuardPolicy::default(), slot.clone());

        // Positive weight on eda: high eda means stressed.
        install(&slot, [0.0, 0.0, 1.0, 0.0], -6.0, Normalization::identity());
        let stressed = engine.classify(reading(0.0, 34.0, 10.0, 0.0));
        assert_eq!(stressed.label, ClassificationLabel::Stressed);
        assert!(stressed.confidence.unwrap() > 0.5);

        let calm = engine.classify(reading(0.0, 34.0, 5.5, 0.0));
        assert_eq!(calm.label, ClassificationLabel::Calm);
        assert_eq!(calm.decision, Decision::Model);
    }

    #[test]
    fn bad_normalization_maps_to_prediction_error() {
        let slot = Arc::new(ClassifierSlot::new());
        install(
            &slot,
            [1.0; 4],
            0.0,
            Normalization {
                mean: [0.0; 4],
                std: [0.0; 4],
            },
        );
        let engine = ClassificationEngine::new(GuardPolicy::default(), slot);

        let result = engine.classify(reading(0.1, 40.0, 10.0, 3.0));
        assert_eq!(result.label, ClassificationLabel::PredictionError);
        assert_eq!(result.confidence, None);
    }
}
