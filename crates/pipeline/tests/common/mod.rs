//! Fakes and builders shared by the pipeline integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use yomi_core::job::{AnalysisConfig, DeviceClass, JobRequest, JobStatus, TranslationConfig};
use yomi_core::registry::{JobRegistry, JobSnapshot};
use yomi_core::types::JobId;
use yomi_gpu::{GpuArbiter, HeadroomConfig, MemoryInfo, MemoryProbe, ModelEvictor};
use yomi_pipeline::analysis::{AnalysisInvocation, AnalysisOutcome, AnalysisRunner};
use yomi_pipeline::translation::{TranslationBackend, TranslationRequest};
use yomi_pipeline::{JobRunner, JobService, PipelineConfig, PipelineError, WorkerPool};

/// Eighty Japanese characters: enough to pass the source-script guard.
pub const JAPANESE_TEXT: &str = "日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。\
日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。";

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Analysis fake driven by the input file name:
///
/// - `*fail*`: prints an error line and exits 1 without output.
/// - `*english*`: writes `<stem>.md` with English text.
/// - anything else: reports two pages and writes `<stem>.md` in Japanese.
///
/// After every line it samples the job's progress from the registry.
pub struct FakeAnalyzer {
    registry: Arc<JobRegistry>,
    delay: Duration,
    pub progress_samples: Mutex<Vec<f32>>,
    pub calls: Mutex<Vec<(String, DeviceClass)>>,
    pub intervals: Mutex<Vec<(Instant, Instant)>>,
}

impl FakeAnalyzer {
    pub fn new(registry: Arc<JobRegistry>, delay: Duration) -> Self {
        Self {
            registry,
            delay,
            progress_samples: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            intervals: Mutex::new(Vec::new()),
        }
    }

    fn sample(&self, results_dir: &Path) {
        let job_id = results_dir
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| JobId::from(n.to_string_lossy().into_owned()));
        if let Some(snapshot) = job_id.and_then(|id| self.registry.snapshot(&id)) {
            self.progress_samples.lock().unwrap().push(snapshot.progress);
        }
    }
}

#[async_trait]
impl AnalysisRunner for FakeAnalyzer {
    async fn run(
        &self,
        invocation: AnalysisInvocation<'_>,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<AnalysisOutcome, PipelineError> {
        let started = Instant::now();
        let name = invocation
            .input
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        let stem = invocation
            .input
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        self.calls
            .lock()
            .unwrap()
            .push((name.clone(), invocation.config.device));

        tokio::time::sleep(self.delay).await;

        let exit_code = if name.contains("fail") {
            on_line("Error: could not parse document".to_string());
            self.sample(invocation.results_dir);
            1
        } else {
            for line in ["Processing page 1/2", "Processing page 2/2"] {
                on_line(line.to_string());
                self.sample(invocation.results_dir);
            }
            let text = if name.contains("english") {
                "This document is already written in English."
            } else {
                JAPANESE_TEXT
            };
            tokio::fs::write(invocation.results_dir.join(format!("{stem}.md")), text)
                .await
                .unwrap();
            0
        };

        self.intervals
            .lock()
            .unwrap()
            .push((started, Instant::now()));
        Ok(AnalysisOutcome {
            exit_code: Some(exit_code),
            elapsed: started.elapsed(),
        })
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTranslator {
    pub missing_model: bool,
    /// Panic inside `translate` instead of answering.
    pub panics: bool,
    pub requests: Mutex<Vec<TranslationRequest>>,
}

#[async_trait]
impl TranslationBackend for FakeTranslator {
    async fn ensure_model(&self, model: &str) -> Result<(), PipelineError> {
        if self.missing_model {
            return Err(PipelineError::TranslationService(format!(
                "Model '{model}' not found (available: llama3:8b)"
            )));
        }
        Ok(())
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<String, PipelineError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.panics {
            panic!("translator crashed");
        }
        Ok(format!("Traduction de {} caractères", request.text.chars().count()))
    }
}

// ---------------------------------------------------------------------------
// GPU collaborators
// ---------------------------------------------------------------------------

pub struct FixedProbe(pub MemoryInfo);

impl MemoryProbe for FixedProbe {
    fn memory_info(&self) -> MemoryInfo {
        self.0
    }
}

#[derive(Default)]
pub struct CountingEvictor(pub AtomicUsize);

#[async_trait]
impl ModelEvictor for CountingEvictor {
    async fn evict_models(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst);
        0
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub service: JobService,
    pub registry: Arc<JobRegistry>,
    pub analyzer: Arc<FakeAnalyzer>,
    pub translator: Arc<FakeTranslator>,
    pub evictor: Arc<CountingEvictor>,
    pub arbiter: GpuArbiter,
}

pub struct HarnessOptions {
    pub memory: MemoryInfo,
    pub translator: FakeTranslator,
    pub pool_size: usize,
    pub analysis_delay: Duration,
    pub headroom_timeout: Duration,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            memory: MemoryInfo::UNAVAILABLE,
            translator: FakeTranslator::default(),
            pool_size: 2,
            analysis_delay: Duration::from_millis(10),
            headroom_timeout: Duration::from_secs(5),
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(JobRegistry::default());
    let analyzer = Arc::new(FakeAnalyzer::new(
        Arc::clone(&registry),
        options.analysis_delay,
    ));
    let translator = Arc::new(options.translator);
    let evictor = Arc::new(CountingEvictor::default());

    let config = PipelineConfig {
        output_folder: dir.path().join("output"),
        pool_size: options.pool_size,
        gpu_permit_timeout: Duration::from_secs(30),
        headroom_timeout: options.headroom_timeout,
        headroom: HeadroomConfig {
            poll_interval: Duration::from_millis(20),
            evict_interval: Duration::from_millis(50),
        },
        ..PipelineConfig::default()
    };

    let arbiter = GpuArbiter::new(
        Arc::new(FixedProbe(options.memory)),
        Arc::clone(&evictor) as Arc<dyn ModelEvictor>,
        config.headroom,
    );
    let runner = Arc::new(JobRunner::new(
        Arc::clone(&registry),
        arbiter.clone(),
        Arc::clone(&analyzer) as Arc<dyn AnalysisRunner>,
        Arc::clone(&translator) as Arc<dyn TranslationBackend>,
        Arc::new(config.clone()),
    ));
    let pool = WorkerPool::new(config.pool_size, config.queue_capacity);
    let service = JobService::new(runner, pool, "qwen3:8b");

    Harness {
        dir,
        service,
        registry,
        analyzer,
        translator,
        evictor,
        arbiter,
    }
}

impl Harness {
    /// Create input files and return their paths as strings.
    pub fn inputs(&self, names: &[&str]) -> Vec<String> {
        let input_dir = self.dir.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        names
            .iter()
            .map(|name| {
                let path: PathBuf = input_dir.join(name);
                std::fs::write(&path, b"%PDF-fake").unwrap();
                path.to_string_lossy().into_owned()
            })
            .collect()
    }

    pub fn results_dir(&self, job_id: &JobId) -> PathBuf {
        self.dir
            .path()
            .join("output")
            .join(job_id.as_str())
            .join("results")
    }

    /// Poll until the job leaves `Running`.
    pub async fn wait_terminal(&self, job_id: &JobId) -> JobSnapshot {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let snapshot = self.registry.snapshot(job_id).expect("job exists");
            if snapshot.status != JobStatus::Running {
                return snapshot;
            }
            assert!(Instant::now() < deadline, "job {job_id} did not finish");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn request(inputs: Vec<String>, device: DeviceClass, translate: bool) -> JobRequest {
    JobRequest {
        input_files: inputs,
        analysis: AnalysisConfig {
            device,
            ..AnalysisConfig::default()
        },
        translation: translate.then(|| TranslationConfig {
            target_lang: "fr".to_string(),
            model: String::new(),
            prompt_template: None,
            num_ctx: 4096,
            pdf_container: Default::default(),
        }),
    }
}

pub fn messages(snapshot: &JobSnapshot) -> Vec<&str> {
    snapshot.logs.iter().map(|l| l.message.as_str()).collect()
}
