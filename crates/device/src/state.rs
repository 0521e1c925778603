//! Connection state owned by the device manager.

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::events::DeviceEvent;

/// Where the link is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Connected and the read loop is running.
    Listening,
    ReconnectWait,
    /// Reconnect attempts exhausted. Cleared only by `configure` or `start`.
    Failed,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Listening)
    }
}

/// Snapshot of the link state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub port: String,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
}

impl ConnectionState {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            port: port.into(),
            reconnect_attempts: 0,
            last_error: None,
        }
    }
}

/// Shared cell holding the current [`ConnectionState`].
///
/// Writers build a new state from the previous one and replace it whole;
/// readers always get a full clone. Every effective change is announced on
/// the event channel.
#[derive(Clone)]
pub(crate) struct StateCell {
    state: Arc<RwLock<ConnectionState>>,
    event_tx: broadcast::Sender<DeviceEvent>,
}

impl StateCell {
    pub(crate) fn new(initial: ConnectionState, event_tx: broadcast::Sender<DeviceEvent>) -> Self {
        Self {
            state: Arc::new(RwLock::new(initial)),
            event_tx,
        }
    }

    pub(crate) fn snapshot(&self) -> ConnectionState {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the state with `f(current)`; returns the new state.
    pub(crate) fn update(&self, f: impl FnOnce(&ConnectionState) -> ConnectionState) -> ConnectionState {
        let (next, changed) = {
            let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let next = f(&guard);
            let changed = next != *guard;
            *guard = next.clone();
            (next, changed)
        };

        if changed {
            tracing::debug!(
                status = ?next.status,
                port = %next.port,
                attempts = next.reconnect_attempts,
                "Device state changed"
            );
            let _ = self.event_tx.send(DeviceEvent::StateChanged(next.clone()));
        }
        next
    }

    pub(crate) fn emit(&self, event: DeviceEvent) {
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_emits_only_on_change() {
        let (tx, mut rx) = broadcast::channel(8);
        let cell = StateCell::new(ConnectionState::new("mock0"), tx);

        cell.update(|s| ConnectionState {
            status: ConnectionStatus::Connecting,
            ..s.clone()
        });
        cell.update(|s| s.clone());

        match rx.try_recv().unwrap() {
            DeviceEvent::StateChanged(state) => {
                assert_eq!(state.status, ConnectionStatus::Connecting)
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(ConnectionStatus::ReconnectWait).unwrap();
        assert_eq!(json, "reconnect_wait");
        assert!(ConnectionStatus::Listening.is_connected());
        assert!(!ConnectionStatus::Failed.is_connected());
    }
}
