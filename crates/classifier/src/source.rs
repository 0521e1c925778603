//! Labeled training data supplied by an external collaborator.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TrainingError;
use crate::model::Features;

/// Feature rows with one label each (`true` = stressed).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<Features>,
    pub labels: Vec<bool>,
}

impl TrainingSet {
    pub fn push(&mut self, features: Features, stressed: bool) {
        self.features.push(features);
        self.labels.push(stressed);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Where retraining pulls newly labeled data from.
#[async_trait]
pub trait TrainingDataSource: Send + Sync {
    /// New samples since the last acknowledged fetch, or `None`.
    async fn fetch_new(&self) -> Result<Option<TrainingSet>, TrainingError>;

    /// Mark the last fetched batch as used. Called only after the model
    /// trained on it has been persisted and installed.
    async fn acknowledge(&self) -> Result<(), TrainingError> {
        Ok(())
    }

    /// Set aside the last fetched batch because no model can be trained on
    /// it. The next fetch moves on to newer data.
    async fn reject(&self) -> Result<(), TrainingError> {
        self.acknowledge().await
    }
}

/// A JSON-lines inbox file.
///
/// Each line is `{"bvp", "temperature", "eda", "acceleration_magnitude"?,
/// "label"}` where `label` is `"Stressed"`/`"Calm"`, `1`/`0` or a boolean.
/// A fetch moves the inbox aside so writers can keep appending to a fresh
/// file; the moved batch is deleted on acknowledge, renamed to
/// `<inbox>.rejected` on reject and re-read otherwise.
#[derive(Debug, Clone)]
pub struct JsonlInboxSource {
    inbox: PathBuf,
    batch: PathBuf,
    rejected: PathBuf,
}

#[derive(Deserialize)]
struct InboxRecord {
    bvp: f64,
    temperature: f64,
    eda: f64,
    #[serde(default)]
    acceleration_magnitude: f64,
    label: RawLabel,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Flag(bool),
    Code(u8),
    Name(String),
}

impl RawLabel {
    fn stressed(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Code(0) => Some(false),
            Self::Code(1) => Some(true),
            Self::Code(_) => None,
            Self::Name(name) => match name.to_ascii_lowercase().as_str() {
                "stressed" | "stress" => Some(true),
                "calm" => Some(false),
                _ => None,
            },
        }
    }
}

impl JsonlInboxSource {
    pub fn new(inbox: impl Into<PathBuf>) -> Self {
        let inbox = inbox.into();
        let sibling = |suffix: &str| {
            let mut name = inbox.file_name().unwrap_or_default().to_os_string();
            name.push(suffix);
            inbox.with_file_name(name)
        };
        let batch = sibling(".processing");
        let rejected = sibling(".rejected");
        Self {
            inbox,
            batch,
            rejected,
        }
    }

    pub fn inbox_path(&self) -> &Path {
        &self.inbox
    }

    /// Where the most recently rejected batch is kept for inspection.
    pub fn rejected_path(&self) -> &Path {
        &self.rejected
    }

    /// Parse inbox contents, skipping lines that are not valid samples.
    pub fn parse(contents: &str) -> TrainingSet {
        let mut set = TrainingSet::default();
        for (index, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: InboxRecord = match serde_json::from_str(line) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping malformed training sample");
                    continue;
                }
            };
            let Some(stressed) = record.label.stressed() else {
                tracing::warn!(line = index + 1, "Skipping training sample with unknown label");
                continue;
            };
            set.push(
                [
                    record.bvp,
                    record.temperature,
                    record.eda,
                    record.acceleration_magnitude,
                ],
                stressed,
            );
        }
        set
    }
}

#[async_trait]
impl TrainingDataSource for JsonlInboxSource {
    async fn fetch_new(&self) -> Result<Option<TrainingSet>, TrainingError> {
        if !tokio::fs::try_exists(&self.batch).await.unwrap_or(false) {
            match tokio::fs::rename(&self.inbox, &self.batch).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(TrainingError::Source(e.to_string())),
            }
        }

        let contents = tokio::fs::read_to_string(&self.batch)
            .await
            .map_err(|e| TrainingError::Source(e.to_string()))?;

        let set = Self::parse(&contents);
        if set.is_empty() {
            self.acknowledge().await?;
            return Ok(None);
        }
        Ok(Some(set))
    }

    async fn acknowledge(&self) -> Result<(), TrainingError> {
        match tokio::fs::remove_file(&self.batch).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrainingError::Source(e.to_string())),
        }
    }

    async fn reject(&self) -> Result<(), TrainingError> {
        match tokio::fs::rename(&self.batch, &self.rejected).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TrainingError::Source(e.to_string())),
        }
    }
}
