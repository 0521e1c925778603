//! Domain types and pure logic shared by every IntegriSense crate.
//!
//! Nothing in here performs I/O: readings are normalized, guarded and
//! labelled by plain functions so the device, classifier and API crates
//! can all agree on one canonical shape.

pub mod classification;
pub mod error;
pub mod event_names;
pub mod guard;
pub mod normalize;
pub mod reading;
pub mod synthetic;
pub mod types;
