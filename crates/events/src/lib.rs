//! Incremental job event streams.
//!
//! A [`JobEventPublisher`] follows one job in the registry and emits only
//! what an observer has not seen yet: new log entries (by sequence number),
//! progress changes, and exactly one terminal [`JobEvent::Status`] before
//! the stream ends.

pub mod publisher;

pub use publisher::{JobEvent, JobEventPublisher, DEFAULT_POLL_INTERVAL};
