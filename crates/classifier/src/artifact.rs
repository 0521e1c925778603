//! On-disk model artifact.
//!
//! A JSON document holding the model parameters, the normalization used at
//! training time and provenance metadata. Writes go to a sibling temp file
//! that is renamed over the target, so readers never see a partial file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::handle::{ClassifierHandle, ModelMetadata};
use crate::model::{Features, LogisticModel, Normalization};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: String,
    pub weights: Features,
    pub bias: f64,
    pub normalization: Normalization,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn logistic(
        model: LogisticModel,
        normalization: Normalization,
        metadata: ModelMetadata,
    ) -> Self {
        Self {
            kind: LogisticModel::KIND.to_string(),
            weights: model.weights,
            bias: model.bias,
            normalization,
            metadata,
        }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kind != LogisticModel::KIND {
            return Err(ModelError::Invalid(format!(
                "unsupported model kind '{}'",
                self.kind
            )));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err(ModelError::Invalid("non-finite model parameter".into()));
        }
        self.normalization
            .validate()
            .map_err(|e| ModelError::Invalid(e.to_string()))
    }

    /// Build the runtime handle for this artifact.
    pub fn into_handle(self) -> Result<ClassifierHandle, ModelError> {
        self.validate()?;
        Ok(ClassifierHandle::new(
            Arc::new(LogisticModel::new(self.weights, self.bias)),
            self.normalization,
            self.metadata,
        ))
    }

    pub async fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ModelError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let artifact: Self = serde_json::from_slice(&bytes)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ModelError> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = temp_path(path);

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| ModelError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|source| ModelError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::info!(
            path = %path.display(),
            version = self.metadata.version,
            "Model artifact saved"
        );
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
