use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct GpuMemory {
    /// `false` when no accelerator could be queried.
    pub available: bool,
    pub free_bytes: u64,
    pub total_bytes: u64,
    /// Whether a job currently holds the GPU permit.
    pub busy: bool,
}

/// GET /api/v1/gpu/memory
pub async fn memory(State(state): State<AppState>) -> impl IntoResponse {
    let info = state.arbiter.memory_info();
    Json(DataResponse {
        data: GpuMemory {
            available: !info.is_unconstrained(),
            free_bytes: info.free,
            total_bytes: info.total,
            busy: state.arbiter.is_busy(),
        },
    })
}
