//! Model lifecycle: startup load, operator reload and scheduled retraining.
//!
//! [`ModelLifecycleManager`] is the only writer of the [`ClassifierSlot`].
//! Every path that fails leaves the current classifier in place.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::artifact::ModelArtifact;
use crate::error::ModelError;
use crate::handle::{ClassifierSlot, ModelMetadata};
use crate::source::TrainingDataSource;
use crate::trainer::{self, TrainingParams};

/// Result of one retrain cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrainOutcome {
    /// The data source had nothing new.
    NoData,
    /// A new model was trained, persisted and installed.
    Retrained(ModelMetadata),
}

pub struct ModelLifecycleManager {
    slot: Arc<ClassifierSlot>,
    artifact_path: PathBuf,
    source: Arc<dyn TrainingDataSource>,
    params: TrainingParams,
    /// Serializes reload and retrain so two writers never race on the file.
    write_lock: Mutex<()>,
}

impl ModelLifecycleManager {
    pub fn new(
        slot: Arc<ClassifierSlot>,
        artifact_path: impl Into<PathBuf>,
        source: Arc<dyn TrainingDataSource>,
    ) -> Self {
        Self {
            slot,
            artifact_path: artifact_path.into(),
            source,
            params: TrainingParams::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_params(mut self, params: TrainingParams) -> Self {
        self.params = params;
        self
    }

    pub fn slot(&self) -> &Arc<ClassifierSlot> {
        &self.slot
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Try to load the artifact. Never fatal: on any failure the slot is
    /// left empty and the engine reports `ModelUnavailable`.
    pub async fn load_at_startup(&self) -> bool {
        match self.reload().await {
            Ok(metadata) => {
                tracing::info!(
                    path = %self.artifact_path.display(),
                    version = metadata.version,
                    samples = metadata.samples,
                    "Model loaded"
                );
                true
            }
            Err(ModelError::NotFound(path)) => {
                tracing::warn!(path = %path.display(), "Model artifact not found, serving without a model");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load model, serving without a model");
                false
            }
        }
    }

    /// Re-read the artifact from disk and swap it in.
    pub async fn reload(&self) -> Result<ModelMetadata, ModelError> {
        let _guard = self.write_lock.lock().await;

        let artifact = ModelArtifact::load(&self.artifact_path).await?;
        let handle = artifact.into_handle()?;
        let metadata = handle.metadata().clone();
        self.slot.swap(handle);
        Ok(metadata)
    }

    /// Pull new data, train, persist, swap. A failure keeps the old model.
    /// A batch that cannot train is rejected; a failed save is retried
    /// next cycle.
    pub async fn retrain_once(&self) -> Result<RetrainOutcome, ModelError> {
        let _guard = self.write_lock.lock().await;

        let Some(set) = self.source.fetch_new().await? else {
            tracing::debug!("No new training data");
            return Ok(RetrainOutcome::NoData);
        };

        let samples = set.len();
        let params = self.params;
        let trained = match tokio::task::spawn_blocking(move || trainer::train(&set, &params))
            .await
            .map_err(|e| ModelError::Task(e.to_string()))?
        {
            Ok(trained) => trained,
            Err(e) if e.is_data_error() => {
                tracing::warn!(error = %e, samples, "Rejecting training batch");
                if let Err(reject) = self.source.reject().await {
                    tracing::warn!(error = %reject, "Failed to set aside rejected training batch");
                }
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        let version = self.slot.metadata().map(|m| m.version).unwrap_or(0) + 1;
        let metadata = ModelMetadata {
            version,
            trained_at: Utc::now(),
            samples,
        };

        let artifact =
            ModelArtifact::logistic(trained.model, trained.normalization, metadata.clone());
        artifact.save(&self.artifact_path).await?;
        self.slot.swap(artifact.into_handle()?);

        if let Err(e) = self.source.acknowledge().await {
            tracing::warn!(error = %e, "Failed to acknowledge training batch");
        }

        tracing::info!(version, samples, loss = trained.loss, "Model retrained and swapped in");
        Ok(RetrainOutcome::Retrained(metadata))
    }

    /// Spawn the periodic retrain job.
    ///
    /// The first cycle runs one `interval` after the call. Cancellation is
    /// observed between cycles; a cycle in progress runs to completion.
    pub fn schedule_retrain(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tracing::info!(interval_secs = interval.as_secs(), "Retrain job started");

            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Retrain job stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.retrain_once().await {
                            Ok(RetrainOutcome::NoData) => {}
                            Ok(RetrainOutcome::Retrained(_)) => {}
                            Err(e) => {
                                tracing::error!(error = %e, "Retrain failed, keeping current model");
                            }
                        }
                    }
                }
            }
        })
    }
}
