//! REST API client for the Ollama HTTP endpoints.
//!
//! Wraps model listing, running-model introspection, chat, and model
//! unloading using [`reqwest`].

use serde::Serialize;

use crate::config::OllamaConfig;
use crate::types::{
    ChatRequest, ChatResponse, ModelInfo, PsResponse, RunningModel, TagsResponse, UnloadRequest,
};

/// HTTP client for a single Ollama instance.
pub struct OllamaApi {
    client: reqwest::Client,
    config: OllamaConfig,
}

/// Errors from the Ollama REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum OllamaApiError {
    /// The HTTP request itself failed (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Ollama returned a non-2xx status code.
    #[error("Ollama API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The requested model is not installed on the instance.
    #[error("Model '{model}' not found (available: {})", .available.join(", "))]
    ModelNotFound {
        model: String,
        available: Vec<String>,
    },
}

impl OllamaApiError {
    /// Whether the service could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, OllamaApiError::Request(e) if e.is_connect() || e.is_timeout())
    }
}

impl OllamaApi {
    /// Create a client for the configured instance.
    pub fn new(config: OllamaConfig) -> Result<Self, OllamaApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.chat_timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// List locally available models (`GET /api/tags`).
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, OllamaApiError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .timeout(self.config.control_timeout)
            .send()
            .await?;

        let tags: TagsResponse = Self::parse_response(response).await?;
        Ok(tags.models)
    }

    /// Fail with [`OllamaApiError::ModelNotFound`] unless `model` is installed.
    ///
    /// A bare name such as `qwen3` also matches its `:latest` tag.
    pub async fn ensure_model(&self, model: &str) -> Result<(), OllamaApiError> {
        let models = self.list_models().await?;
        let wanted_latest = format!("{model}:latest");
        if models
            .iter()
            .any(|m| m.name == model || m.name == wanted_latest)
        {
            return Ok(());
        }
        Err(OllamaApiError::ModelNotFound {
            model: model.to_string(),
            available: models.into_iter().map(|m| m.name).collect(),
        })
    }

    /// List models currently loaded in memory (`GET /api/ps`).
    pub async fn running_models(&self) -> Result<Vec<RunningModel>, OllamaApiError> {
        let response = self
            .client
            .get(self.url("/api/ps"))
            .timeout(self.config.control_timeout)
            .send()
            .await?;

        let ps: PsResponse = Self::parse_response(response).await?;
        Ok(ps.models)
    }

    /// Run a non-streaming chat completion (`POST /api/chat`).
    ///
    /// Uses the long chat timeout configured on the client.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, OllamaApiError> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(request)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Ask Ollama to drop a model's weights immediately.
    ///
    /// Sends `POST /api/generate` with no prompt and `keep_alive: 0`.
    pub async fn unload_model(&self, model: &str) -> Result<(), OllamaApiError> {
        self.post_control("/api/generate", &UnloadRequest { model, keep_alive: 0 })
            .await
    }

    /// Unload every model reported by `/api/ps`.
    ///
    /// Individual unload failures are logged and skipped. Returns the
    /// number of models that were asked to unload successfully.
    pub async fn unload_running_models(&self) -> Result<usize, OllamaApiError> {
        let running = self.running_models().await?;
        let mut unloaded = 0;
        for model in &running {
            match self.unload_model(&model.name).await {
                Ok(()) => {
                    tracing::debug!(model = %model.name, size_vram = model.size_vram, "Model unloaded");
                    unloaded += 1;
                }
                Err(e) => {
                    tracing::warn!(model = %model.name, error = %e, "Failed to unload model");
                }
            }
        }
        Ok(unloaded)
    }

    // ---- private helpers ----

    async fn post_control<B: Serialize>(&self, path: &str, body: &B) -> Result<(), OllamaApiError> {
        let response = self
            .client
            .post(self.url(path))
            .timeout(self.config.control_timeout)
            .json(body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`OllamaApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, OllamaApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OllamaApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OllamaApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), OllamaApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
