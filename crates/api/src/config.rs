use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use integrisense_core::guard::{GuardPolicy, Interval};
use integrisense_core::normalize::DelimitedLayout;
use integrisense_device::DeviceConfig;
use integrisense_events::hub::DEFAULT_SUBSCRIBER_BUFFER;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development against a
/// wearable on the first USB serial port.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Initial device link settings.
    pub device: DeviceConfig,
    /// Calm guard intervals.
    pub guard: GuardPolicy,
    /// Positional order of delimited device lines.
    pub line_layout: DelimitedLayout,
    /// Model artifact location.
    pub model_path: PathBuf,
    /// Seconds between retrain cycles; `0` disables retraining.
    pub retrain_interval_secs: u64,
    /// Labeled-data inbox consumed by retraining.
    pub training_inbox_path: PathBuf,
    /// JSON-lines record store. Persistence is off when unset.
    pub record_store_path: Option<PathBuf>,
    /// Per-subscriber outbound queue depth.
    pub subscriber_buffer: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                                       |
    /// |---------------------------------|-----------------------------------------------|
    /// | `HOST`                          | `0.0.0.0`                                     |
    /// | `PORT`                          | `8080`                                        |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`                       |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                                          |
    /// | `SERIAL_PORT`                   | `/dev/ttyUSB0`                                |
    /// | `SERIAL_BAUD_RATE`              | `115200`                                      |
    /// | `SERIAL_TIMEOUT_MS`             | `1000`                                        |
    /// | `SERIAL_AUTO_DETECT`            | `true`                                        |
    /// | `SERIAL_ENABLED`                | `true`                                        |
    /// | `SERIAL_MAX_RECONNECT_ATTEMPTS` | `5`                                           |
    /// | `SERIAL_RECONNECT_DELAY_MS`     | `5000`                                        |
    /// | `SERIAL_POLL_INTERVAL_MS`       | `10`                                          |
    /// | `MODEL_PATH`                    | `stress_detection_model.json`                 |
    /// | `RETRAIN_INTERVAL_SECS`         | `86400`                                       |
    /// | `TRAINING_INBOX_PATH`           | `training_inbox.jsonl`                        |
    /// | `RECORD_STORE_PATH`             | unset                                         |
    /// | `SUBSCRIBER_BUFFER`             | `64`                                          |
    /// | `GUARD_<FEATURE>_MIN` / `_MAX`  | see [`GuardPolicy::default`]                  |
    /// | `DEVICE_LINE_LAYOUT`            | `bvp,temperature,eda,accel_x,accel_y,accel_z` |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        let host = var("HOST", "0.0.0.0");
        let port: u16 = parse(&var("PORT", "8080"), "PORT must be a valid u16");

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = parse(
            &var("REQUEST_TIMEOUT_SECS", "30"),
            "REQUEST_TIMEOUT_SECS must be a valid u64",
        );

        let defaults = DeviceConfig::default();
        let device = DeviceConfig {
            port: var("SERIAL_PORT", &defaults.port),
            baud_rate: parse(
                &var("SERIAL_BAUD_RATE", "115200"),
                "SERIAL_BAUD_RATE must be a valid u32",
            ),
            timeout: Duration::from_millis(parse(
                &var("SERIAL_TIMEOUT_MS", "1000"),
                "SERIAL_TIMEOUT_MS must be a valid u64",
            )),
            auto_detect: parse_bool(
                &var("SERIAL_AUTO_DETECT", "true"),
                "SERIAL_AUTO_DETECT must be a boolean",
            ),
            enabled: parse_bool(
                &var("SERIAL_ENABLED", "true"),
                "SERIAL_ENABLED must be a boolean",
            ),
            max_reconnect_attempts: parse(
                &var("SERIAL_MAX_RECONNECT_ATTEMPTS", "5"),
                "SERIAL_MAX_RECONNECT_ATTEMPTS must be a valid u32",
            ),
            reconnect_delay: Duration::from_millis(parse(
                &var("SERIAL_RECONNECT_DELAY_MS", "5000"),
                "SERIAL_RECONNECT_DELAY_MS must be a valid u64",
            )),
            poll_interval: Duration::from_millis(parse(
                &var("SERIAL_POLL_INTERVAL_MS", "10"),
                "SERIAL_POLL_INTERVAL_MS must be a valid u64",
            )),
            restart_delay: defaults.restart_delay,
        };
        assert!(device.baud_rate > 0, "SERIAL_BAUD_RATE must be positive");
        assert!(
            !device.poll_interval.is_zero(),
            "SERIAL_POLL_INTERVAL_MS must be positive"
        );

        let guard = guard_from_lookup(&lookup);

        let line_layout = DelimitedLayout::from_str(&var(
            "DEVICE_LINE_LAYOUT",
            integrisense_core::normalize::DEFAULT_LINE_LAYOUT,
        ))
        .unwrap_or_else(|e| panic!("DEVICE_LINE_LAYOUT is invalid: {e}"));

        let retrain_interval_secs: u64 = parse(
            &var("RETRAIN_INTERVAL_SECS", "86400"),
            "RETRAIN_INTERVAL_SECS must be a valid u64",
        );

        let subscriber_buffer: usize = parse(
            &var("SUBSCRIBER_BUFFER", &DEFAULT_SUBSCRIBER_BUFFER.to_string()),
            "SUBSCRIBER_BUFFER must be a valid usize",
        );

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            device,
            guard,
            line_layout,
            model_path: var("MODEL_PATH", "stress_detection_model.json").into(),
            retrain_interval_secs,
            training_inbox_path: var("TRAINING_INBOX_PATH", "training_inbox.jsonl").into(),
            record_store_path: lookup("RECORD_STORE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            subscriber_buffer,
        }
    }

    /// Retrain period, or `None` when retraining is disabled.
    pub fn retrain_interval(&self) -> Option<Duration> {
        (self.retrain_interval_secs > 0).then(|| Duration::from_secs(self.retrain_interval_secs))
    }
}

fn guard_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> GuardPolicy {
    let defaults = GuardPolicy::default();
    let interval = |prefix: &str, default: Interval| {
        let min_key = format!("GUARD_{prefix}_MIN");
        let max_key = format!("GUARD_{prefix}_MAX");
        let min = lookup(&min_key)
            .map(|v| parse::<f64>(&v, &format!("{min_key} must be a number")))
            .unwrap_or(default.min);
        let max = lookup(&max_key)
            .map(|v| parse::<f64>(&v, &format!("{max_key} must be a number")))
            .unwrap_or(default.max);
        Interval::new(min, max).unwrap_or_else(|e| panic!("GUARD_{prefix}: {e}"))
    };

    GuardPolicy {
        bvp: interval("BVP", defaults.bvp),
        temperature: interval("TEMPERATURE", defaults.temperature),
        eda: interval("EDA", defaults.eda),
        acceleration_magnitude: interval("ACCEL", defaults.acceleration_magnitude),
    }
}

fn parse<T: FromStr>(value: &str, message: &str) -> T {
    value
        .trim()
        .parse()
        .unwrap_or_else(|_| panic!("{message}, got '{value}'"))
}

fn parse_bool(value: &str, message: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => panic!("{message}, got '{value}'"),
    }
}
