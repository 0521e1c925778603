/// Result alias for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors raised by transports and the connection manager.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Serial port error from the OS driver.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The port could not be opened.
    #[error("Failed to open {port}: {reason}")]
    Open { port: String, reason: String },

    /// An operation needed a live link and there was none.
    #[error("Device is not connected")]
    NotConnected,

    /// A configuration update was rejected at the boundary.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A blocking transport call panicked or was cancelled.
    #[error("Transport task failed: {0}")]
    Task(String),
}
