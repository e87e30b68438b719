use axum::routing::get;
use axum::Router;

use crate::handlers::llm;
use crate::state::AppState;

/// Routes mounted at `/llm`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/models", get(llm::list_models))
        .route("/running", get(llm::running_models))
}
