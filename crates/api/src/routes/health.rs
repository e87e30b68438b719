use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the LLM service cannot be reached.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub llm_healthy: bool,
    pub workers: WorkerStats,
}

#[derive(Serialize)]
pub struct WorkerStats {
    pub size: usize,
    pub running: usize,
    pub in_flight: usize,
    pub shutting_down: bool,
}

/// GET /health -- service, worker pool and LLM health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let llm_healthy = match state.ollama.list_models().await {
        Ok(_) => true,
        Err(e) => {
            tracing::debug!(error = %e, "LLM health probe failed");
            false
        }
    };

    let pool = state.service.pool();
    Json(HealthResponse {
        status: if llm_healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        llm_healthy,
        workers: WorkerStats {
            size: pool.size(),
            running: pool.running(),
            in_flight: pool.in_flight(),
            shutting_down: pool.is_shutting_down(),
        },
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
