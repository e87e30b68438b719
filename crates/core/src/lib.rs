//! Domain core for the document analysis and translation service.
//!
//! Pure types and logic shared by every other crate: job configuration and
//! lifecycle, the in-memory [`registry::JobRegistry`], the progress line
//! parser, artifact naming, and the source-script guard. No internal
//! dependencies.

pub mod error;
pub mod job;
pub mod naming;
pub mod progress;
pub mod registry;
pub mod script;
pub mod types;
