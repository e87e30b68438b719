use std::sync::Arc;

use yomi_gpu::GpuArbiter;
use yomi_ollama::OllamaApi;
use yomi_pipeline::JobService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Job admission, lookup and the worker pool.
    pub service: Arc<JobService>,
    /// LLM service client (introspection endpoints and health).
    pub ollama: Arc<OllamaApi>,
    /// GPU permit and memory probe.
    pub arbiter: GpuArbiter,
    pub config: Arc<ServerConfig>,
}
