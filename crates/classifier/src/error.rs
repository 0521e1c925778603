use std::path::PathBuf;

/// Failure while scaling features or invoking a classifier.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    /// A normalization parameter cannot be used to scale `feature`.
    #[error("Invalid normalization for {feature}: {reason}")]
    Scaling {
        feature: &'static str,
        reason: String,
    },

    /// The classifier produced NaN, infinity or a value outside `[0, 1]`.
    #[error("Classifier produced invalid score {0}")]
    InvalidScore(f64),
}

/// Training could not produce a model from the given data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrainingError {
    #[error("Need at least {required} samples, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },

    #[error("Training data contains only one label")]
    SingleClass,

    #[error("Feature rows ({rows}) and labels ({labels}) differ in length")]
    LengthMismatch { rows: usize, labels: usize },

    #[error("Training data contains non-finite values")]
    NonFinite,

    #[error("Training diverged")]
    Diverged,

    /// The training data source failed.
    #[error("Training data unavailable: {0}")]
    Source(String),
}

impl TrainingError {
    /// Whether retrying on the same batch can never succeed.
    pub fn is_data_error(&self) -> bool {
        !matches!(self, Self::Source(_))
    }
}

/// Errors loading, saving or replacing a model artifact.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model artifact not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed model artifact: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid model artifact: {0}")]
    Invalid(String),

    #[error(transparent)]
    Training(#[from] TrainingError),

    #[error("Background task failed: {0}")]
    Task(String),
}
