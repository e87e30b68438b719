//! Yomi API server library.
//!
//! Exposes config, state, error handling, routes and the job event socket
//! so integration tests and the binary entrypoint build the same app.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
pub mod ws;
