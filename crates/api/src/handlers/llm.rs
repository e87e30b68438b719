//! LLM service introspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use yomi_ollama::types::{ModelInfo, RunningModel};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelList {
    /// Model used when a job does not name one.
    pub default_model: String,
    pub models: Vec<ModelInfo>,
}

/// GET /api/v1/llm/models
pub async fn list_models(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let models = state.ollama.list_models().await?;
    Ok(Json(DataResponse {
        data: ModelList {
            default_model: state.ollama.config().default_model.clone(),
            models,
        },
    }))
}

/// GET /api/v1/llm/running
pub async fn running_models(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let running: Vec<RunningModel> = state.ollama.running_models().await?;
    Ok(Json(DataResponse { data: running }))
}
