use std::time::Duration;

/// Connection settings for the Ollama service.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://localhost:11434`.
    pub base_url: String,
    /// Model used when a job does not name one.
    pub default_model: String,
    /// Timeout for chat requests. Inference on long documents is slow.
    pub chat_timeout: Duration,
    /// Timeout for listing, introspection, and unload requests.
    pub control_timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            default_model: "qwen3:8b".to_string(),
            chat_timeout: Duration::from_secs(1800),
            control_timeout: Duration::from_secs(10),
        }
    }
}

impl OllamaConfig {
    /// Load from environment variables, falling back to defaults.
    ///
    /// | Env Var               | Default                  |
    /// |-----------------------|--------------------------|
    /// | `OLLAMA_URL`          | `http://localhost:11434` |
    /// | `OLLAMA_MODEL`        | `qwen3:8b`               |
    /// | `OLLAMA_TIMEOUT_SECS` | `1800`                   |
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            base_url: std::env::var("OLLAMA_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(default.base_url),
            default_model: std::env::var("OLLAMA_MODEL").unwrap_or(default.default_model),
            chat_timeout: match std::env::var("OLLAMA_TIMEOUT_SECS") {
                Ok(raw) => match raw.trim().parse() {
                    Ok(secs) => Duration::from_secs(secs),
                    Err(_) => {
                        tracing::warn!(value = %raw, "Invalid OLLAMA_TIMEOUT_SECS, using default");
                        default.chat_timeout
                    }
                },
                Err(_) => default.chat_timeout,
            },
            control_timeout: default.control_timeout,
        }
    }
}
