//! Record store for classified readings.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use integrisense_core::classification::StreamPayload;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for classified readings.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &StreamPayload) -> Result<(), SinkError>;
}

/// Appends one JSON object per line to a file.
pub struct JsonlRecordSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl JsonlRecordSink {
    /// Open `path` for appending, creating it if needed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for JsonlRecordSink {
    async fn append(&self, record: &StreamPayload) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
