use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use yomi_core::error::CoreError;
use yomi_ollama::OllamaApiError;
use yomi_pipeline::{PipelineError, PoolError, SubmitError};

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the workspace crates and renders them as
/// `{ "error": ..., "code": ... }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// The worker pool refused the job.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// The LLM service failed or could not be reached.
    #[error(transparent)]
    Llm(#[from] OllamaApiError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(core) => AppError::Core(core),
            SubmitError::Rejected(pool) => AppError::Pool(pool),
        }
    }
}

fn internal(message: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %message, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Pipeline(PipelineError::Core(core)) => classify_core(core),
            AppError::Pipeline(other) => internal(&other.to_string()),

            AppError::Pool(pool) => match pool {
                PoolError::Busy { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "BUSY", pool.to_string())
                }
                PoolError::ShuttingDown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SHUTTING_DOWN",
                    pool.to_string(),
                ),
            },

            AppError::Llm(err) => {
                tracing::warn!(error = %err, "LLM service request failed");
                let message = if err.is_unreachable() {
                    "LLM service is unreachable".to_string()
                } else {
                    "LLM service returned an error".to_string()
                };
                (StatusCode::BAD_GATEWAY, "LLM_UNAVAILABLE", message)
            }

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yomi_core::types::JobId;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn domain_errors_map_to_status_codes() {
        assert_eq!(
            status_of(CoreError::job_not_found(&JobId::from("abc")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::Validation("bad".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(PoolError::Busy { capacity: 4 }.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(SubmitError::Rejected(PoolError::ShuttingDown).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn pipeline_failures_are_sanitized() {
        let err = PipelineError::Io(std::io::Error::other("/secret/path unreadable"));
        assert_eq!(status_of(err.into()), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
