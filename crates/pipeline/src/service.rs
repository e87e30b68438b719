//! Job admission and lookup.
//!
//! [`JobService`] is the surface the HTTP layer talks to: it validates a
//! request, registers the job, and hands it to the worker pool without
//! waiting for it to run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use yomi_core::error::CoreError;
use yomi_core::job::{JobRequest, JobStatus};
use yomi_core::registry::{JobMeta, JobRegistry, JobSnapshot, JobSummary};
use yomi_core::types::JobId;

use crate::artifacts::{list_artifacts, Artifact};
use crate::error::{PipelineError, SubmitError};
use crate::joblog::JobLog;
use crate::orchestrator::JobRunner;
use crate::pool::WorkerPool;

pub struct JobService {
    runner: Arc<JobRunner>,
    pool: WorkerPool,
    default_model: String,
}

impl JobService {
    pub fn new(runner: Arc<JobRunner>, pool: WorkerPool, default_model: impl Into<String>) -> Self {
        Self {
            runner,
            pool,
            default_model: default_model.into(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        self.runner.registry()
    }

    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Admit a job and return its id immediately.
    pub fn submit_job(&self, mut request: JobRequest) -> Result<JobId, SubmitError> {
        if let Some(translation) = request.translation.as_mut() {
            if translation.model.trim().is_empty() {
                translation.model = self.default_model.clone();
            }
        }
        request.validate()?;

        let reservation = self.pool.reserve()?;

        let registry = self.registry();
        let job_id = loop {
            let candidate = JobId::generate();
            let meta = JobMeta {
                input_files: request.input_files.clone(),
                device: request.analysis.device,
                translate: request.translation.is_some(),
            };
            match registry.create_job(candidate.clone(), meta) {
                Ok(()) => break candidate,
                // Eight hex characters can collide; draw again.
                Err(CoreError::Conflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        };

        let log = JobLog::new(Arc::clone(registry), job_id.clone());
        log.info(format!(
            "Job queued: {} file(s), format {}, device {}{}",
            request.input_files.len(),
            request.analysis.format.as_arg(),
            request.analysis.device.as_arg(),
            request
                .translation
                .as_ref()
                .map(|t| format!(", translate to {} with {}", t.target_lang, t.model))
                .unwrap_or_default()
        ));

        let span = tracing::info_span!("job", job_id = %job_id);
        let runner = Arc::clone(&self.runner);
        let id = job_id.clone();
        let on_cancel = move || {
            log.error("Job cancelled: service shutting down");
            log.finish(JobStatus::Error);
        };
        self.pool.spawn(
            reservation,
            span,
            async move { runner.run(id, request).await },
            on_cancel,
        );

        Ok(job_id)
    }

    pub fn get_snapshot(&self, job_id: &JobId) -> Option<JobSnapshot> {
        self.registry().snapshot(job_id)
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<JobSummary> {
        self.registry().list()
    }

    /// Files produced for a job, or `None` for unknown jobs.
    pub async fn artifacts(&self, job_id: &JobId) -> Option<Result<Vec<Artifact>, PipelineError>> {
        if !self.registry().contains(job_id) {
            return None;
        }
        Some(list_artifacts(&self.runner.job_paths(job_id)).await)
    }

    /// Location of one listed artifact, or `None` if the job or file is unknown.
    ///
    /// `name` is looked up in the results listing rather than joined onto the
    /// directory, so names like `../x` or absolute paths never resolve.
    pub async fn artifact_path(
        &self,
        job_id: &JobId,
        name: &str,
    ) -> Result<Option<PathBuf>, PipelineError> {
        if !self.registry().contains(job_id) {
            return Ok(None);
        }
        let paths = self.runner.job_paths(job_id);
        let listed = list_artifacts(&paths)
            .await?
            .into_iter()
            .any(|artifact| artifact.name == name);
        Ok(listed.then(|| paths.results.join(name)))
    }

    /// Stop admitting jobs and drain the pool.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.pool.shutdown(timeout).await
    }
}
