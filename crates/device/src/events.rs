//! Events emitted by the device manager.
//!
//! Delivered on a [`tokio::sync::broadcast`] channel; call
//! `DeviceManager::subscribe` to receive them.

use serde::Serialize;

use crate::state::ConnectionState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Any change to the connection state.
    StateChanged(ConnectionState),

    /// A transport was opened on `port`.
    Linked { port: String },

    /// The transport on `port` was closed.
    Unlinked { port: String, reason: String },
}
