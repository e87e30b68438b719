//! Shared helpers for the API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yomi_api::config::ServerConfig;
use yomi_api::router::build_app_router;
use yomi_api::state::AppState;
use yomi_core::registry::JobRegistry;
use yomi_gpu::{GpuArbiter, HeadroomConfig, MemoryInfo, MemoryProbe, ModelEvictor};
use yomi_ollama::{OllamaApi, OllamaConfig};
use yomi_pipeline::analysis::{AnalysisInvocation, AnalysisOutcome, AnalysisRunner};
use yomi_pipeline::{
    JobRunner, JobService, PipelineConfig, PipelineError, TranslationBackend, WorkerPool,
};

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        stream_poll_interval: Duration::from_millis(50),
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Eighty Japanese characters, enough to be worth translating.
pub const JAPANESE_TEXT: &str = "日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。\
日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。日本語の文書です。";

/// Reports two pages and writes `<stem>.md` after `delay`.
pub struct ScriptedAnalyzer {
    pub delay: Duration,
}

#[async_trait]
impl AnalysisRunner for ScriptedAnalyzer {
    async fn run(
        &self,
        invocation: AnalysisInvocation<'_>,
        on_line: &mut (dyn FnMut(String) + Send),
    ) -> Result<AnalysisOutcome, PipelineError> {
        let started = std::time::Instant::now();
        tokio::time::sleep(self.delay).await;
        on_line("Processing page 1/2".to_string());
        on_line("Processing page 2/2".to_string());

        let stem = invocation
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "out".to_string());
        tokio::fs::write(invocation.results_dir.join(format!("{stem}.md")), JAPANESE_TEXT)
            .await?;
        Ok(AnalysisOutcome {
            exit_code: Some(0),
            elapsed: started.elapsed(),
        })
    }
}

pub struct FixedProbe(pub MemoryInfo);

impl MemoryProbe for FixedProbe {
    fn memory_info(&self) -> MemoryInfo {
        self.0
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestOptions {
    pub memory: MemoryInfo,
    pub pool_size: usize,
    pub queue_capacity: usize,
    pub analysis_delay: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            memory: MemoryInfo::UNAVAILABLE,
            pool_size: 2,
            queue_capacity: 4,
            analysis_delay: Duration::from_millis(10),
        }
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    /// Stands in for the LLM service.
    pub llm: MockServer,
    pub dir: tempfile::TempDir,
}

/// Build the full application router around fake collaborators.
///
/// The LLM client points at a `wiremock` server; mount expectations on
/// `TestApp::llm` as needed.
pub async fn build_test_app(options: TestOptions) -> TestApp {
    let llm = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let ollama = Arc::new(
        OllamaApi::new(OllamaConfig {
            base_url: llm.uri(),
            ..OllamaConfig::default()
        })
        .unwrap(),
    );

    let pipeline_config = Arc::new(PipelineConfig {
        output_folder: dir.path().join("output"),
        pool_size: options.pool_size,
        queue_capacity: options.queue_capacity,
        headroom: HeadroomConfig {
            poll_interval: Duration::from_millis(20),
            evict_interval: Duration::from_millis(50),
        },
        ..PipelineConfig::default()
    });

    let arbiter = GpuArbiter::new(
        Arc::new(FixedProbe(options.memory)),
        Arc::clone(&ollama) as Arc<dyn ModelEvictor>,
        pipeline_config.headroom,
    );
    let runner = Arc::new(JobRunner::new(
        Arc::new(JobRegistry::default()),
        arbiter.clone(),
        Arc::new(ScriptedAnalyzer {
            delay: options.analysis_delay,
        }) as Arc<dyn AnalysisRunner>,
        Arc::clone(&ollama) as Arc<dyn TranslationBackend>,
        Arc::clone(&pipeline_config),
    ));
    let pool = WorkerPool::new(pipeline_config.pool_size, pipeline_config.queue_capacity);
    let service = Arc::new(JobService::new(runner, pool, "qwen3:8b"));

    let config = test_config();
    let state = AppState {
        service,
        ollama,
        arbiter,
        config: Arc::new(config.clone()),
    };
    TestApp {
        app: build_app_router(state.clone(), &config),
        state,
        llm,
        dir,
    }
}

impl TestApp {
    /// Create empty input files and return their paths.
    pub fn inputs(&self, names: &[&str]) -> Vec<String> {
        let input_dir = self.dir.path().join("input");
        std::fs::create_dir_all(&input_dir).unwrap();
        names
            .iter()
            .map(|name| {
                let p = input_dir.join(name);
                std::fs::write(&p, b"%PDF-fake").unwrap();
                p.to_string_lossy().into_owned()
            })
            .collect()
    }

    /// Mount a `/api/tags` response listing `models`.
    pub async fn mount_models(&self, models: &[&str]) {
        let body = serde_json::json!({
            "models": models
                .iter()
                .map(|m| serde_json::json!({ "name": m, "size": 1024 }))
                .collect::<Vec<_>>()
        });
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.llm)
            .await;
    }

    /// Poll `GET /api/v1/jobs/{id}` until the job leaves `running`.
    pub async fn wait_terminal(&self, job_id: &str) -> Value {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        loop {
            let (status, json) = get(&self.app, &format!("/api/v1/jobs/{job_id}")).await;
            assert_eq!(status, StatusCode::OK);
            if json["data"]["status"] != "running" {
                return json["data"].clone();
            }
            assert!(std::time::Instant::now() < deadline, "job {job_id} did not finish");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}
