//! Long-lived background tasks spawned at startup.

pub mod device_events;
pub mod device_readings;
