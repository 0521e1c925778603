//! Sensor readings as they move through the pipeline.
//!
//! A [`Reading`] is what an ingress produced; a [`CanonicalReading`] is the
//! fixed-order feature vector every downstream component consumes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

/// Number of features in a canonical reading.
pub const FEATURE_COUNT: usize = 4;

/// Feature names in canonical order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] =
    ["bvp", "temperature", "eda", "acceleration_magnitude"];

/// Where a reading entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingSource {
    /// Pushed by a client over HTTP.
    Network,
    /// Read from the attached device by the connection manager.
    Device,
    /// Generated by the diagnostic endpoint.
    Synthetic,
}

impl ReadingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Device => "device",
            Self::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for ReadingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-axis acceleration sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean norm of the vector.
    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Motion information carried by a raw reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Axes(Acceleration),
    /// A magnitude the sender already computed.
    Magnitude(f64),
    Absent,
}

/// A raw, source-tagged reading as produced at ingress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub bvp: f64,
    pub temperature: f64,
    pub eda: f64,
    pub motion: Motion,
    pub source: ReadingSource,
}

impl Reading {
    /// Magnitude derived from the motion data; never negative.
    pub fn acceleration_magnitude(&self) -> f64 {
        let magnitude = match self.motion {
            Motion::Axes(axes) => axes.magnitude(),
            Motion::Magnitude(m) => m,
            Motion::Absent => 0.0,
        };
        magnitude.max(0.0)
    }

    /// Stamp the reading and collapse it into the canonical feature vector.
    pub fn canonicalize(&self, timestamp: Timestamp) -> CanonicalReading {
        CanonicalReading {
            features: [
                self.bvp,
                self.temperature,
                self.eda,
                self.acceleration_magnitude(),
            ],
            timestamp,
            source: self.source,
        }
    }
}

/// Fixed-order feature vector `[bvp, temperature, eda, acceleration_magnitude]`.
///
/// Only constructible from a [`Reading`], so the magnitude invariant holds
/// for every instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanonicalReading {
    features: [f64; FEATURE_COUNT],
    timestamp: Timestamp,
    source: ReadingSource,
}

impl CanonicalReading {
    pub fn features(&self) -> &[f64; FEATURE_COUNT] {
        &self.features
    }

    pub fn bvp(&self) -> f64 {
        self.features[0]
    }

    pub fn temperature(&self) -> f64 {
        self.features[1]
    }

    pub fn eda(&self) -> f64 {
        self.features[2]
    }

    pub fn acceleration_magnitude(&self) -> f64 {
        self.features[3]
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn source(&self) -> ReadingSource {
        self.source
    }
}
