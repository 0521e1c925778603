//! Event names used on the live subscription channel.
//!
//! Subscribers receive JSON envelopes of the form
//! `{"event": <name>, "data": <payload>}`; these constants are the only
//! valid values for `event`.

/// A classified reading (sensor data).
pub const EVENT_STREAM: &str = "stream";

/// Subscriber acknowledgments and subscriber connect/disconnect notices.
pub const EVENT_STATUS: &str = "status";

/// Every connection-state transition of the device manager.
pub const EVENT_SERIAL_STATUS: &str = "serial_status";

/// Device presence edges (link came up / went away).
pub const EVENT_ESP32_STATUS: &str = "esp32_status";

/// Liveness ping sent by a subscriber.
pub const EVENT_PING: &str = "ping";

/// Reply to [`EVENT_PING`], delivered only to the subscriber that asked.
pub const EVENT_PONG: &str = "pong";
