pub mod gpu;
pub mod health;
pub mod jobs;
pub mod llm;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                        list, submit
/// /jobs/{id}                   snapshot
/// /jobs/{id}/artifacts         result files
///
/// /llm/models                  installed models
/// /llm/running                 models loaded in memory
///
/// /gpu/memory                  accelerator memory and permit state
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/llm", llm::router())
        .nest("/gpu", gpu::router())
}

/// Long-lived routes, mounted outside the request timeout.
///
/// ```text
/// /api/v1/jobs/{id}/events     WebSocket event stream
/// ```
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/api/v1/jobs/{id}/events", get(ws::job_events))
}
