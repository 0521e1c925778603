//! Live subscription channel over WebSocket.
//!
//! Provides the HTTP upgrade handler that bridges a socket to a
//! [`BroadcastHub`](integrisense_events::BroadcastHub) subscription, and the
//! heartbeat that keeps idle sockets alive.

mod handler;
mod heartbeat;

pub use handler::ws_handler;
pub use heartbeat::{start_heartbeat, HEARTBEAT_INTERVAL};
