//! Stress classification: the guard-then-model engine, the hot-swappable
//! classifier slot, model artifacts, training and the model lifecycle.

pub mod artifact;
pub mod engine;
pub mod error;
pub mod handle;
pub mod lifecycle;
pub mod model;
pub mod source;
pub mod trainer;

pub use engine::ClassificationEngine;
pub use error::{ModelError, PredictError, TrainingError};
pub use handle::{ClassifierHandle, ClassifierSlot, ModelMetadata};
pub use lifecycle::{ModelLifecycleManager, RetrainOutcome};
pub use model::{Classifier, LogisticModel, Normalization};
pub use source::{JsonlInboxSource, TrainingDataSource, TrainingSet};
