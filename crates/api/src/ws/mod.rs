//! WebSocket endpoints.

pub mod events;

pub use events::job_events;
