//! IntegriSense API server library.
//!
//! Exposes config, state, error handling, routes, the live WebSocket channel
//! and service wiring so integration tests and the binary entrypoint share
//! the same building blocks.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod router;
pub mod routes;
pub mod services;
pub mod state;
pub mod ws;
