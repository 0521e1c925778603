/// Why a raw payload could not be turned into a canonical reading.
///
/// Normalization never produces partial output: every failure path ends
/// in one of these variants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("No data received")]
    EmptyPayload,

    #[error("Payload must be a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Expected at least {expected} fields, got {actual}")]
    TooFewTokens { expected: usize, actual: usize },

    #[error("Invalid token '{token}' at position {position}")]
    InvalidToken { position: usize, token: String },

    #[error("Undecodable line: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
