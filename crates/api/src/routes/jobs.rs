//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                  -> list_jobs
/// POST   /                  -> submit_job
/// GET    /{id}              -> get_job
/// GET    /{id}/artifacts    -> list_artifacts
/// GET    /{id}/artifacts/{name} -> download_artifact
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::submit_job))
        .route("/{id}", get(jobs::get_job))
        .route("/{id}/artifacts", get(jobs::list_artifacts))
        .route("/{id}/artifacts/{name}", get(jobs::download_artifact))
}
