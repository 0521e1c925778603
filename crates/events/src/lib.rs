//! Result distribution.
//!
//! [`hub::BroadcastHub`] fans classified readings and status messages out to
//! live subscribers. [`bus::ResultBus`] carries the same results to
//! in-process consumers such as [`persistence::RecordPersistence`], which
//! appends them to the record store.

pub mod bus;
pub mod hub;
pub mod message;
pub mod persistence;
pub mod sink;

pub use bus::ResultBus;
pub use hub::{BroadcastHub, Subscription};
pub use message::{LiveEvent, Outbound};
pub use persistence::RecordPersistence;
pub use sink::{JsonlRecordSink, RecordSink, SinkError};
