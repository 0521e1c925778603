//! Device ingress: transport access and the connection manager.
//!
//! [`manager::DeviceManager`] owns one link to the wearable (normally a USB
//! serial bridge), discovers it, keeps it alive with bounded reconnects and
//! runs the read loop that turns device lines into canonical readings.
//!
//! The physical link sits behind the [`transport::Transport`] trait so the
//! manager can be driven by the in-memory [`transport::mock`] transport in
//! tests.

pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
pub mod manager;
pub mod reconnect;
pub mod state;
pub mod transport;

pub use config::{DeviceConfig, SerialConfigUpdate};
pub use error::{DeviceError, DeviceResult};
pub use events::DeviceEvent;
pub use manager::{ConfigOutcome, DeviceManager, DeviceStatus};
pub use reconnect::ReconnectPolicy;
pub use state::{ConnectionState, ConnectionStatus};
