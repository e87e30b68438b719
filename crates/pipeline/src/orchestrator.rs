//! Per-job workflow.
//!
//! ```text
//! Start -> [GPU permit + headroom] -> AnalyzingFile(0..n) -> Translating -> Done
//!                                  \------------- any state -------------> Failed
//! ```
//!
//! Analysis runs one file at a time. A file whose analysis fails is logged
//! and skipped; only pipeline-scoped errors (GPU timeouts, I/O on the job
//! directory, panics) fail the job. Whatever the outcome, cached LLM weights
//! are evicted before the GPU permit is given back, and the job's status is
//! set last.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures::FutureExt;
use yomi_core::job::{AnalysisConfig, JobRequest, JobStatus, LogLevel};
use yomi_core::progress::{
    global_progress, parse_progress_line, ANALYSIS_CEILING, ANALYSIS_CEILING_WITH_TRANSLATION,
    TRANSLATION_CEILING,
};
use yomi_core::registry::JobRegistry;
use yomi_core::types::JobId;
use yomi_gpu::{GpuArbiter, GpuError, GpuPermit};

use crate::analysis::{display_name, AnalysisInvocation, AnalysisOutcome, AnalysisRunner};
use crate::artifacts::JobPaths;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::joblog::JobLog;
use crate::translation::{TranslationBackend, TranslationLimits, TranslationStage};

/// Position of one input file within the analysis stage.
#[derive(Debug, Clone, Copy)]
struct FileStep {
    index: usize,
    total: usize,
    ceiling: f32,
}

/// Executes admitted jobs. Shared by every worker of the pool.
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    arbiter: GpuArbiter,
    analyzer: Arc<dyn AnalysisRunner>,
    translator: Arc<dyn TranslationBackend>,
    config: Arc<PipelineConfig>,
}

impl JobRunner {
    pub fn new(
        registry: Arc<JobRegistry>,
        arbiter: GpuArbiter,
        analyzer: Arc<dyn AnalysisRunner>,
        translator: Arc<dyn TranslationBackend>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            registry,
            arbiter,
            analyzer,
            translator,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn arbiter(&self) -> &GpuArbiter {
        &self.arbiter
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn job_paths(&self, job_id: &JobId) -> JobPaths {
        JobPaths::new(&self.config.output_folder, job_id)
    }

    /// Run one job to a terminal status.
    pub async fn run(&self, job_id: JobId, request: JobRequest) {
        let log = JobLog::new(Arc::clone(&self.registry), job_id);

        let outcome = AssertUnwindSafe(self.execute(&log, &request))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {
                log.success("Job complete");
                log.finish(JobStatus::Complete);
            }
            Ok(Err(e)) => {
                log.error(format!("Job failed: {e}"));
                log.finish(JobStatus::Error);
            }
            Err(_) => {
                log.error("Job failed: unexpected internal error");
                log.finish(JobStatus::Error);
            }
        }
    }

    async fn execute(&self, log: &JobLog, request: &JobRequest) -> Result<(), PipelineError> {
        let paths = self.job_paths(log.job_id());
        paths.create().await?;

        let device = request.analysis.device;
        let permit = if device.is_gpu() {
            Some(self.acquire_gpu(log).await?)
        } else {
            None
        };

        // A panicking stage must still reach `release_gpu` below.
        let result = AssertUnwindSafe(async {
            if permit.is_some() {
                self.wait_for_headroom(log).await?;
            }
            self.run_stages(log, &paths, request).await
        })
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(PipelineError::Panicked(panic_message(payload.as_ref()))));

        if let Some(permit) = permit {
            self.release_gpu(log, permit).await;
        }
        result
    }

    // ---- GPU ----

    async fn acquire_gpu(&self, log: &JobLog) -> Result<GpuPermit, PipelineError> {
        if self.arbiter.is_busy() {
            log.info("Waiting for the GPU (another job is using it)");
        }
        let permit = self.arbiter.acquire(self.config.gpu_permit_timeout).await?;
        log.info("GPU permit acquired");
        Ok(permit)
    }

    async fn wait_for_headroom(&self, log: &JobLog) -> Result<(), PipelineError> {
        let required = self.config.gpu_required_bytes;
        log.info("Freeing GPU memory (unloading LLM models)");

        let ready = self
            .arbiter
            .wait_for_headroom(required, self.config.headroom_timeout, |info, waited| {
                log.warning(format!(
                    "Waiting for GPU memory: {:.1} GiB free of {:.1} GiB, need {:.1} GiB ({}s)",
                    info.free_gib(),
                    info.total_gib(),
                    required as f64 / (1024.0 * 1024.0 * 1024.0),
                    waited.as_secs()
                ));
            })
            .await;

        if !ready {
            return Err(GpuError::ResourceTimeout {
                resource: "GPU memory headroom",
                waited: self.config.headroom_timeout,
            }
            .into());
        }

        let info = self.arbiter.memory_info();
        if !info.is_unconstrained() {
            log.info(format!(
                "GPU ready: {:.1} GiB free of {:.1} GiB",
                info.free_gib(),
                info.total_gib()
            ));
        }
        Ok(())
    }

    async fn release_gpu(&self, log: &JobLog, permit: GpuPermit) {
        let evicted = self.arbiter.evict().await;
        if evicted > 0 {
            log.info(format!("Unloaded {evicted} LLM model(s) from GPU"));
        }
        let held = permit.held_for();
        permit.release();
        log.info(format!("GPU released after {}s", held.as_secs()));
    }

    // ---- stages ----

    async fn run_stages(
        &self,
        log: &JobLog,
        paths: &JobPaths,
        request: &JobRequest,
    ) -> Result<(), PipelineError> {
        let total = request.input_files.len();
        let ceiling = if request.translation.is_some() {
            ANALYSIS_CEILING_WITH_TRANSLATION
        } else {
            ANALYSIS_CEILING
        };

        log.info(format!(
            "Analyzing {total} file(s) on {}",
            request.analysis.device.as_arg()
        ));

        let mut failed = 0;
        for (index, file) in request.input_files.iter().enumerate() {
            let input = Path::new(file);
            let name = display_name(input);
            log.log(
                LogLevel::Info,
                format!("File {}/{total}: {name}", index + 1),
                Some(global_progress(index, total, None, ceiling)),
            );
            log.pages(None);

            let step = FileStep {
                index,
                total,
                ceiling,
            };
            match self
                .analyze_file(log, input, &paths.results, &request.analysis, step)
                .await
            {
                Ok(outcome) => log.success(format!(
                    "Analysis of {name} finished in {:.1}s",
                    outcome.elapsed.as_secs_f32()
                )),
                Err(e) if e.is_file_scoped() => {
                    log.error(e.to_string());
                    failed += 1;
                }
                Err(e) => return Err(e),
            }
            log.progress(global_progress(index + 1, total, None, ceiling));
        }

        if failed > 0 {
            log.warning(format!("{failed} of {total} file(s) could not be analyzed"));
        }

        if let Some(translation) = &request.translation {
            TranslationStage {
                log,
                backend: self.translator.as_ref(),
                paths,
                config: translation,
                limits: TranslationLimits {
                    max_input_chars: self.config.max_input_chars,
                    min_source_chars: self.config.min_source_chars,
                },
                progress: (ANALYSIS_CEILING_WITH_TRANSLATION, TRANSLATION_CEILING),
            }
            .run()
            .await?;
        }
        Ok(())
    }

    async fn analyze_file(
        &self,
        log: &JobLog,
        input: &Path,
        results_dir: &Path,
        config: &AnalysisConfig,
        step: FileStep,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let name = display_name(input);
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(PipelineError::ChildProcessFailure {
                file: name,
                detail: "input file not found".to_string(),
            });
        }

        let mut on_line = |line: String| {
            let page = parse_progress_line(&line);
            if page.is_some() {
                log.pages(page);
            }
            let progress =
                page.map(|p| global_progress(step.index, step.total, Some(p), step.ceiling));
            log.output_line(&line, progress);
        };

        let outcome = self
            .analyzer
            .run(
                AnalysisInvocation {
                    input,
                    results_dir,
                    config,
                },
                &mut on_line,
            )
            .await?;

        if !outcome.success() {
            let detail = match outcome.exit_code {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            };
            return Err(PipelineError::ChildProcessFailure { file: name, detail });
        }
        Ok(outcome)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
