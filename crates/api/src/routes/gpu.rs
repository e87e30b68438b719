use axum::routing::get;
use axum::Router;

use crate::handlers::gpu;
use crate::state::AppState;

/// Routes mounted at `/gpu`.
pub fn router() -> Router<AppState> {
    Router::new().route("/memory", get(gpu::memory))
}
