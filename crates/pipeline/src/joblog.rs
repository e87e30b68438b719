//! Per-job logging handle.
//!
//! Every entry goes to the [`JobRegistry`] (what observers see) and is
//! mirrored to `tracing` at the matching level (what operators see).

use std::sync::Arc;

use yomi_core::job::{JobStatus, LogLevel};
use yomi_core::progress::PageProgress;
use yomi_core::registry::JobRegistry;
use yomi_core::types::JobId;

#[derive(Clone)]
pub struct JobLog {
    registry: Arc<JobRegistry>,
    job_id: JobId,
}

impl JobLog {
    pub fn new(registry: Arc<JobRegistry>, job_id: JobId) -> Self {
        Self { registry, job_id }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Append an entry, optionally raising progress with it.
    pub fn log(&self, level: LogLevel, message: impl Into<String>, progress: Option<f32>) {
        let message = message.into();
        match level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(job_id = %self.job_id, "{message}")
            }
            LogLevel::Warning => tracing::warn!(job_id = %self.job_id, "{message}"),
            LogLevel::Error => tracing::error!(job_id = %self.job_id, "{message}"),
        }
        if let Err(e) = self.registry.append(&self.job_id, message, level, progress) {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to record job log entry");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message, None);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, None);
    }

    /// Raw analysis output: logged verbatim to the registry, traced at debug.
    pub fn output_line(&self, line: &str, progress: Option<f32>) {
        tracing::debug!(job_id = %self.job_id, "{line}");
        if let Err(e) = self
            .registry
            .append(&self.job_id, line, LogLevel::Info, progress)
        {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to record job log entry");
        }
    }

    pub fn progress(&self, progress: f32) {
        if let Err(e) = self.registry.set_progress(&self.job_id, progress) {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to record job progress");
        }
    }

    pub fn pages(&self, page: Option<PageProgress>) {
        if let Err(e) = self.registry.set_pages(&self.job_id, page) {
            tracing::error!(job_id = %self.job_id, error = %e, "Failed to record page counter");
        }
    }

    pub fn finish(&self, status: JobStatus) {
        match self.registry.set_status(&self.job_id, status) {
            Ok(()) => tracing::info!(job_id = %self.job_id, %status, "Job finished"),
            Err(e) => {
                tracing::error!(job_id = %self.job_id, error = %e, "Failed to record job status")
            }
        }
    }
}
