//! Random readings for the diagnostic `/test-data` endpoint.

use chrono::Utc;
use rand::Rng;

use crate::reading::{Acceleration, CanonicalReading, Motion, Reading, ReadingSource};

/// Generate a physiologically plausible reading tagged as synthetic.
///
/// Ranges are wide enough to land both inside and outside the default
/// guard intervals.
pub fn synthetic_reading<R: Rng + ?Sized>(rng: &mut R) -> CanonicalReading {
    Reading {
        bvp: rng.random_range(-2.5..2.5),
        temperature: rng.random_range(32.0..39.0),
        eda: rng.random_range(0.0..8.0),
        motion: Motion::Axes(Acceleration::new(
            rng.random_range(-1.5..1.5),
            rng.random_range(-1.5..1.5),
            rng.random_range(-1.5..1.5),
        )),
        source: ReadingSource::Synthetic,
    }
    .canonicalize(Utc::now())
}
