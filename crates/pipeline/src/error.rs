use yomi_core::error::CoreError;
use yomi_gpu::GpuError;

/// Failures inside a job's stage pipeline.
///
/// File-scoped variants (`ChildProcessFailure`, `TranslationService`,
/// `Extraction`) are logged and the pipeline moves on. The rest end the job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    ResourceTimeout(#[from] GpuError),

    #[error("Analysis of {file} failed: {detail}")]
    ChildProcessFailure { file: String, detail: String },

    #[error("Failed to start {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Translation service error: {0}")]
    TranslationService(String),

    #[error("Text extraction from {file} failed: {message}")]
    Extraction { file: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Unexpected internal error: {0}")]
    Panicked(String),
}

impl PipelineError {
    /// Whether the failure only affects one file of the batch.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::ChildProcessFailure { .. }
                | PipelineError::Spawn { .. }
                | PipelineError::TranslationService(_)
                | PipelineError::Extraction { .. }
        )
    }
}

/// Admission failures of the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Worker pool is busy ({capacity} jobs running or queued)")]
    Busy { capacity: usize },

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

/// Why a job could not be admitted.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error(transparent)]
    Rejected(#[from] PoolError),
}
