//! Device connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DeviceError, DeviceResult};

/// Running configuration of the device link.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Port to open; replaced by discovery when `auto_detect` is set.
    pub port: String,
    pub baud_rate: u32,
    /// Per-call transport I/O timeout.
    pub timeout: Duration,
    /// Run discovery before connecting.
    pub auto_detect: bool,
    /// When `false`, `start()` is a no-op.
    pub enabled: bool,
    /// Reconnect attempts after a failure before giving up.
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Read-loop sleep when no data is pending.
    pub poll_interval: Duration,
    /// Pause between stop and start on a restarting reconfigure.
    pub restart_delay: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            timeout: Duration::from_millis(1000),
            auto_detect: true,
            enabled: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            restart_delay: Duration::from_millis(500),
        }
    }
}

/// Partial update accepted by `DeviceManager::configure`.
///
/// Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerialConfigUpdate {
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default, alias = "rate", alias = "baudrate")]
    pub baud_rate: Option<u32>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub auto_detect: Option<bool>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl SerialConfigUpdate {
    /// Reject values that can never produce a working link.
    pub fn validate(&self) -> DeviceResult<()> {
        if let Some(port) = &self.port {
            if port.trim().is_empty() {
                return Err(DeviceError::InvalidConfig("port must not be empty".into()));
            }
        }
        if self.baud_rate == Some(0) {
            return Err(DeviceError::InvalidConfig(
                "baud_rate must be positive".into(),
            ));
        }
        if self.timeout_ms == Some(0) {
            return Err(DeviceError::InvalidConfig(
                "timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Apply to `config` and report whether the link must be restarted.
    ///
    /// Only port, rate and the enabled flag require a restart.
    pub fn apply_to(&self, config: &mut DeviceConfig) -> bool {
        let mut restart = false;

        if let Some(port) = &self.port {
            let port = port.trim();
            if port != config.port {
                config.port = port.to_string();
                restart = true;
            }
        }
        if let Some(rate) = self.baud_rate {
            if rate != config.baud_rate {
                config.baud_rate = rate;
                restart = true;
            }
        }
        if let Some(enabled) = self.enabled {
            if enabled != config.enabled {
                config.enabled = enabled;
                restart = true;
            }
        }
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(auto_detect) = self.auto_detect {
            config.auto_detect = auto_detect;
        }

        restart
    }
}
