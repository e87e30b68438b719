//! HTTP client for the local Ollama LLM service.
//!
//! Wraps the endpoints the translation pipeline and the GPU arbiter rely on:
//! model listing, running-model introspection, non-streaming chat, and
//! model unloading via a zero `keep_alive`.

pub mod api;
pub mod config;
pub mod types;

pub use api::{OllamaApi, OllamaApiError};
pub use config::OllamaConfig;
