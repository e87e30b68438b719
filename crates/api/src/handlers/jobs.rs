//! Handlers for the `/jobs` resource.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use yomi_core::error::CoreError;
use yomi_core::job::JobRequest;
use yomi_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SubmittedJob {
    pub job_id: JobId,
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Admit a job and return 202 with its id. The job runs in the background;
/// follow it through `GET /jobs/{id}` or the event stream.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(input): Json<JobRequest>,
) -> AppResult<impl IntoResponse> {
    let job_id = state.service.submit_job(input)?;

    tracing::info!(job_id = %job_id, "Job submitted");

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: SubmittedJob { job_id },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.service.list(),
    })
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = JobId::from(id);
    let snapshot = state
        .service
        .get_snapshot(&job_id)
        .ok_or_else(|| CoreError::job_not_found(&job_id))?;
    Ok(Json(DataResponse { data: snapshot }))
}

/// GET /api/v1/jobs/{id}/artifacts
pub async fn list_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job_id = JobId::from(id);
    let artifacts = state
        .service
        .artifacts(&job_id)
        .await
        .ok_or_else(|| CoreError::job_not_found(&job_id))??;
    Ok(Json(DataResponse { data: artifacts }))
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Guess a Content-Type from an artifact's extension.
fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "md" => "text/markdown; charset=utf-8",
        "html" => "text/html; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

/// ASCII-only `filename` for Content-Disposition.
fn attachment_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_graphic() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// GET /api/v1/jobs/{id}/artifacts/{name}
///
/// Stream one result file as an attachment. Only names that appear in the
/// job's artifact listing are served.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((id, name)): Path<(String, String)>,
) -> AppResult<Response> {
    let job_id = JobId::from(id);
    if state.service.get_snapshot(&job_id).is_none() {
        return Err(CoreError::job_not_found(&job_id).into());
    }
    let path = state
        .service
        .artifact_path(&job_id, &name)
        .await?
        .ok_or_else(|| CoreError::NotFound {
            entity: "Artifact",
            id: job_id.clone(),
        })?;

    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    tracing::debug!(job_id = %job_id, artifact = %name, size, "Serving artifact");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&name))
        .header(header::CONTENT_LENGTH, size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment_name(&name)),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_name_is_header_safe() {
        assert_eq!(attachment_name("doc.md"), "doc.md");
        assert_eq!(attachment_name("日本 \"x\".md"), "____x_.md");
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("a.PDF"), "application/pdf");
        assert_eq!(content_type_for("README"), "application/octet-stream");
    }
}
