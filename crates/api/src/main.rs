use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yomi_api::config::ServerConfig;
use yomi_api::router::build_app_router;
use yomi_api::state::AppState;
use yomi_core::registry::JobRegistry;
use yomi_gpu::{GpuArbiter, ModelEvictor, NvmlMemoryProbe};
use yomi_ollama::{OllamaApi, OllamaConfig};
use yomi_pipeline::analysis::AnalysisRunner;
use yomi_pipeline::{
    JobRunner, JobService, PipelineConfig, TranslationBackend, WorkerPool, YomitokuRunner,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "yomi_api=debug,yomi_pipeline=info,yomi_gpu=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = Arc::new(PipelineConfig::from_env());
    let ollama_config = OllamaConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        output_folder = %pipeline_config.output_folder.display(),
        workers = pipeline_config.pool_size,
        ollama = %ollama_config.base_url,
        "Loaded configuration",
    );

    // --- LLM client ---
    let ollama = Arc::new(OllamaApi::new(ollama_config).expect("Failed to build LLM HTTP client"));
    match ollama.list_models().await {
        Ok(models) => tracing::info!(count = models.len(), "LLM service reachable"),
        Err(e) => tracing::warn!(error = %e, "LLM service not reachable at startup"),
    }

    // --- GPU arbiter ---
    let probe = NvmlMemoryProbe::default();
    if !probe.is_available() {
        tracing::warn!("No NVML device, GPU headroom checks are disabled");
    }
    let arbiter = GpuArbiter::new(
        Arc::new(probe),
        Arc::clone(&ollama) as Arc<dyn ModelEvictor>,
        pipeline_config.headroom,
    );

    // --- Job pipeline ---
    let registry = Arc::new(JobRegistry::new(pipeline_config.log_capacity));
    let analyzer = Arc::new(YomitokuRunner::new(
        pipeline_config.analysis_binary.clone(),
        pipeline_config.analysis_timeout,
    ));
    let runner = Arc::new(JobRunner::new(
        registry,
        arbiter.clone(),
        analyzer as Arc<dyn AnalysisRunner>,
        Arc::clone(&ollama) as Arc<dyn TranslationBackend>,
        Arc::clone(&pipeline_config),
    ));
    let pool = WorkerPool::new(pipeline_config.pool_size, pipeline_config.queue_capacity);
    let service = Arc::new(JobService::new(
        runner,
        pool,
        ollama.config().default_model.clone(),
    ));
    tracing::info!("Job service started");

    // --- App state ---
    let state = AppState {
        service: Arc::clone(&service),
        ollama,
        arbiter,
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining jobs");

    let timeout = config.shutdown_timeout();
    if service.shutdown(timeout).await {
        tracing::info!("All jobs finished");
    } else {
        tracing::warn!(
            timeout_secs = timeout.as_secs(),
            "Jobs still running at shutdown timeout were dropped"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
