//! Classification outcomes and the payload broadcast for each of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reading::{CanonicalReading, ReadingSource};
use crate::types::Timestamp;

/// Every classification resolves to exactly one of these labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationLabel {
    Calm,
    Stressed,
    /// No classifier is loaded. A steady state, not an error.
    ModelUnavailable,
    /// Scaling or invoking the classifier failed.
    PredictionError,
}

impl ClassificationLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Calm => "Calm",
            Self::Stressed => "Stressed",
            Self::ModelUnavailable => "ModelUnavailable",
            Self::PredictionError => "PredictionError",
        }
    }
}

impl fmt::Display for ClassificationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of the engine produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Guard,
    Model,
    Unavailable,
    Error,
}

/// One result per classified reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    pub label: ClassificationLabel,
    /// Probability of `label` when the model produced it.
    pub confidence: Option<f64>,
    pub decision: Decision,
    pub reading: CanonicalReading,
}

impl ClassificationResult {
    pub fn guarded(reading: CanonicalReading) -> Self {
        Self {
            label: ClassificationLabel::Calm,
            confidence: None,
            decision: Decision::Guard,
            reading,
        }
    }

    /// Threshold a stress score at 0.5: strictly above is stressed.
    pub fn from_score(reading: CanonicalReading, score: f64) -> Self {
        let (label, confidence) = if score > 0.5 {
            (ClassificationLabel::Stressed, score)
        } else {
            (ClassificationLabel::Calm, 1.0 - score)
        };
        Self {
            label,
            confidence: Some(confidence),
            decision: Decision::Model,
            reading,
        }
    }

    pub fn unavailable(reading: CanonicalReading) -> Self {
        Self {
            label: ClassificationLabel::ModelUnavailable,
            confidence: None,
            decision: Decision::Unavailable,
            reading,
        }
    }

    pub fn failed(reading: CanonicalReading) -> Self {
        Self {
            label: ClassificationLabel::PredictionError,
            confidence: None,
            decision: Decision::Error,
            reading,
        }
    }

    /// Shape delivered to subscribers and returned to network clients.
    pub fn payload(&self) -> StreamPayload {
        StreamPayload {
            bvp: self.reading.bvp(),
            temperature: self.reading.temperature(),
            eda: self.reading.eda(),
            acceleration_magnitude: round4(self.reading.acceleration_magnitude()),
            prediction: self.label,
            confidence: self.confidence,
            timestamp: self.reading.timestamp(),
            source: self.reading.source(),
        }
    }
}

/// The `stream` event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub bvp: f64,
    pub temperature: f64,
    pub eda: f64,
    pub acceleration_magnitude: f64,
    pub prediction: ClassificationLabel,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub confidence: Option<f64>,
    pub timestamp: Timestamp,
    pub source: ReadingSource,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
