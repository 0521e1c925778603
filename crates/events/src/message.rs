//! Messages delivered to live subscribers.

use integrisense_core::classification::StreamPayload;
use integrisense_core::event_names::{
    EVENT_ESP32_STATUS, EVENT_PONG, EVENT_SERIAL_STATUS, EVENT_STATUS, EVENT_STREAM,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Named event envelope: `{"event": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl LiveEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// A classified reading.
    pub fn stream(payload: &StreamPayload) -> Self {
        Self::new(
            EVENT_STREAM,
            serde_json::to_value(payload).unwrap_or_default(),
        )
    }

    /// Hub-level status (subscribe acknowledgment, joins and leaves).
    pub fn status(message: &str, subscribers: usize) -> Self {
        Self::new(
            EVENT_STATUS,
            json!({ "message": message, "subscribers": subscribers }),
        )
    }

    /// Any device connection-state transition.
    pub fn serial_status<T: Serialize>(state: &T) -> Self {
        Self::new(
            EVENT_SERIAL_STATUS,
            serde_json::to_value(state).unwrap_or_default(),
        )
    }

    /// Device presence edge.
    pub fn esp32_status(connected: bool, port: &str) -> Self {
        Self::new(
            EVENT_ESP32_STATUS,
            json!({ "connected": connected, "port": port }),
        )
    }

    pub fn pong() -> Self {
        Self::new(
            EVENT_PONG,
            json!({ "timestamp": chrono::Utc::now() }),
        )
    }

    /// Wire text for this event.
    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// What a subscriber's outbound queue carries. The transport layer maps
/// these onto its own frames.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Serialized [`LiveEvent`].
    Event(String),
    Ping,
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_has_event_and_data() {
        let text = LiveEvent::esp32_status(true, "/dev/ttyUSB0").to_text();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "esp32_status");
        assert_eq!(value["data"]["connected"], true);
        assert_eq!(value["data"]["port"], "/dev/ttyUSB0");
    }

    #[test]
    fn status_carries_subscriber_count() {
        let event = LiveEvent::status("Connected", 3);
        assert_eq!(event.event, "status");
        assert_eq!(event.data["subscribers"], 3);
    }
}
