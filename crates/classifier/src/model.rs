//! Classifier trait and the logistic model shipped with the service.

use integrisense_core::reading::{FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Feature vector in canonical order.
pub type Features = [f64; FEATURE_COUNT];

/// A binary stress classifier over standardized features.
pub trait Classifier: Send + Sync {
    /// Short identifier stored in artifacts, e.g. `"logistic"`.
    fn kind(&self) -> &'static str;

    /// Probability that the (already scaled) reading is stressed.
    fn score(&self, features: &Features) -> Result<f64, PredictError>;
}

/// Per-feature standardization parameters: `(x - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: Features,
    pub std: Features,
}

impl Normalization {
    /// Identity scaling.
    pub fn identity() -> Self {
        Self {
            mean: [0.0; FEATURE_COUNT],
            std: [1.0; FEATURE_COUNT],
        }
    }

    /// Fail on a zero or non-finite parameter.
    pub fn validate(&self) -> Result<(), PredictError> {
        for i in 0..FEATURE_COUNT {
            let (mean, std) = (self.mean[i], self.std[i]);
            if !mean.is_finite() {
                return Err(PredictError::Scaling {
                    feature: FEATURE_NAMES[i],
                    reason: format!("mean is {mean}"),
                });
            }
            if !std.is_finite() || std == 0.0 {
                return Err(PredictError::Scaling {
                    feature: FEATURE_NAMES[i],
                    reason: format!("std is {std}"),
                });
            }
        }
        Ok(())
    }

    pub fn scale(&self, features: &Features) -> Result<Features, PredictError> {
        self.validate()?;

        let mut scaled = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = (features[i] - self.mean[i]) / self.std[i];
            if !scaled[i].is_finite() {
                return Err(PredictError::Scaling {
                    feature: FEATURE_NAMES[i],
                    reason: format!("scaled value is {}", scaled[i]),
                });
            }
        }
        Ok(scaled)
    }
}

/// Logistic regression: `sigmoid(w . x + b)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Features,
    pub bias: f64,
}

impl LogisticModel {
    pub const KIND: &'static str = "logistic";

    pub fn new(weights: Features, bias: f64) -> Self {
        Self { weights, bias }
    }

    /// Raw linear score before the sigmoid.
    pub fn logit(&self, features: &Features) -> f64 {
        self.weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias
    }
}

impl Classifier for LogisticModel {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn score(&self, features: &Features) -> Result<f64, PredictError> {
        let p = sigmoid(self.logit(features));
        if p.is_finite() {
            Ok(p)
        } else {
            Err(PredictError::InvalidScore(p))
        }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
