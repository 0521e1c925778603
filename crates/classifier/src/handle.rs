//! The active classifier and the slot it is swapped through.
//!
//! A [`ClassifierHandle`] is immutable once built. The [`ClassifierSlot`]
//! holds an `Arc` to the current handle; readers clone the `Arc` under a
//! read lock that is released before the model runs, and a swap replaces
//! the `Arc` wholesale. A classification therefore always sees one
//! complete handle, old or new.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PredictError;
use crate::model::{Classifier, Features, Normalization};

/// Provenance stored alongside a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Increases by one on every retrain.
    pub version: u64,
    pub trained_at: DateTime<Utc>,
    /// Number of samples the model was trained on.
    pub samples: usize,
}

/// A loaded classifier plus the parameters needed to feed it.
pub struct ClassifierHandle {
    classifier: Arc<dyn Classifier>,
    normalization: Normalization,
    metadata: ModelMetadata,
}

impl ClassifierHandle {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        normalization: Normalization,
        metadata: ModelMetadata,
    ) -> Self {
        Self {
            classifier,
            normalization,
            metadata,
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn normalization(&self) -> &Normalization {
        &self.normalization
    }

    pub fn kind(&self) -> &'static str {
        self.classifier.kind()
    }

    /// Scale raw features and return the stress probability.
    pub fn predict(&self, features: &Features) -> Result<f64, PredictError> {
        let scaled = self.normalization.scale(features)?;
        let score = self.classifier.score(&scaled)?;
        if !(0.0..=1.0).contains(&score) {
            return Err(PredictError::InvalidScore(score));
        }
        Ok(score)
    }
}

impl std::fmt::Debug for ClassifierHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierHandle")
            .field("kind", &self.classifier.kind())
            .field("normalization", &self.normalization)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Holder of the currently active [`ClassifierHandle`], if any.
#[derive(Debug, Default)]
pub struct ClassifierSlot {
    current: RwLock<Option<Arc<ClassifierHandle>>>,
}

impl ClassifierSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handle in effect right now.
    pub fn snapshot(&self) -> Option<Arc<ClassifierHandle>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install `handle`, returning the one it replaced.
    pub fn swap(&self, handle: ClassifierHandle) -> Option<Arc<ClassifierHandle>> {
        let next = Arc::new(handle);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        current.replace(next)
    }

    pub fn clear(&self) -> Option<Arc<ClassifierHandle>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.snapshot().map(|h| h.metadata().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LogisticModel;

    fn handle(version: u64, bias: f64) -> ClassifierHandle {
        ClassifierHandle::new(
            Arc::new(LogisticModel::new([0.0; 4], bias)),
            Normalization::identity(),
            ModelMetadata {
                version,
                trained_at: Utc::now(),
                samples: 10,
            },
        )
    }

    #[test]
    fn empty_slot_has_no_snapshot() {
        let slot = ClassifierSlot::new();
        assert!(slot.snapshot().is_none());
        assert!(!slot.is_loaded());
    }

    #[test]
    fn swap_replaces_wholesale_and_old_snapshot_survives() {
        let slot = ClassifierSlot::new();
        assert!(slot.swap(handle(1, -10.0)).is_none());

        let before = slot.snapshot().unwrap();
        let previous = slot.swap(handle(2, 10.0)).unwrap();

        // An in-flight reader keeps the full old handle.
        assert_eq!(before.metadata().version, 1);
        assert!(before.predict(&[0.0; 4]).unwrap() < 0.5);
        assert!(Arc::ptr_eq(&before, &previous));

        let after = slot.snapshot().unwrap();
        assert_eq!(after.metadata().version, 2);
        assert!(after.predict(&[0.0; 4]).unwrap() > 0.5);
    }

    #[test]
    fn clear_unloads() {
        let slot = ClassifierSlot::new();
        slot.swap(handle(1, 0.0));
        assert!(slot.clear().is_some());
        assert!(slot.metadata().is_none());
    }
}
