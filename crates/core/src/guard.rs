//! Deterministic "calm" guard rule.
//!
//! Pure logic, evaluated before any model is consulted. A reading whose four
//! features all sit inside their closed intervals is labelled calm outright.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::reading::{CanonicalReading, FEATURE_COUNT, FEATURE_NAMES};

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Result<Self, CoreError> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(CoreError::Validation(format!(
                "Invalid interval [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    /// Inclusive on both ends; `NaN` is never contained.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Per-feature calm intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardPolicy {
    pub bvp: Interval,
    pub temperature: Interval,
    pub eda: Interval,
    pub acceleration_magnitude: Interval,
}

impl GuardPolicy {
    /// Intervals in canonical feature order.
    pub fn intervals(&self) -> [Interval; FEATURE_COUNT] {
        [
            self.bvp,
            self.temperature,
            self.eda,
            self.acceleration_magnitude,
        ]
    }

    /// Check every interval is well formed.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (interval, name) in self.intervals().iter().zip(FEATURE_NAMES) {
            Interval::new(interval.min, interval.max)
                .map_err(|e| CoreError::Validation(format!("Guard interval for {name}: {e}")))?;
        }
        Ok(())
    }

    /// `true` when every feature lies inside its interval.
    pub fn is_calm(&self, reading: &CanonicalReading) -> bool {
        self.intervals()
            .iter()
            .zip(reading.features())
            .all(|(interval, &value)| interval.contains(value))
    }
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            bvp: Interval { min: -2.0, max: 2.0 },
            temperature: Interval {
                min: 30.0,
                max: 37.0,
            },
            eda: Interval { min: 0.0, max: 5.0 },
            acceleration_magnitude: Interval { min: 0.0, max: 1.5 },
        }
    }
}
