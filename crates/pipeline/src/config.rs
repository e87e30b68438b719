use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use yomi_core::job::DEFAULT_NUM_CTX;
use yomi_core::registry::DEFAULT_LOG_CAPACITY;
use yomi_gpu::HeadroomConfig;

/// Job execution settings loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of per-job directories (default: `output`).
    pub output_folder: PathBuf,
    /// Analysis executable (default: `yomitoku`).
    pub analysis_binary: String,
    /// Wall-clock limit for one analysis invocation.
    pub analysis_timeout: Duration,
    /// Concurrent job slots.
    pub pool_size: usize,
    /// Jobs accepted beyond the running ones before admission is refused.
    pub queue_capacity: usize,
    pub gpu_permit_timeout: Duration,
    /// Free accelerator memory required before GPU analysis starts.
    pub gpu_required_bytes: u64,
    pub headroom_timeout: Duration,
    pub headroom: HeadroomConfig,
    /// Context window used when a request does not set one.
    pub default_num_ctx: u32,
    /// Maximum characters sent in one translation request.
    pub max_input_chars: usize,
    /// Minimum source-script characters for text to be worth translating.
    pub min_source_chars: usize,
    pub log_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("output"),
            analysis_binary: "yomitoku".to_string(),
            analysis_timeout: Duration::from_secs(3600),
            pool_size: 2,
            queue_capacity: 16,
            gpu_permit_timeout: Duration::from_secs(1800),
            gpu_required_bytes: 4 * 1024 * 1024 * 1024,
            headroom_timeout: Duration::from_secs(120),
            headroom: HeadroomConfig::default(),
            default_num_ctx: DEFAULT_NUM_CTX,
            max_input_chars: 4000,
            min_source_chars: 50,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default      |
    /// |------------------------------|--------------|
    /// | `OUTPUT_FOLDER`              | `output`     |
    /// | `ANALYSIS_BINARY`            | `yomitoku`   |
    /// | `ANALYSIS_TIMEOUT_SECS`      | `3600`       |
    /// | `WORKER_POOL_SIZE`           | `2`          |
    /// | `WORKER_QUEUE_CAPACITY`      | `16`         |
    /// | `GPU_PERMIT_TIMEOUT_SECS`    | `1800`       |
    /// | `GPU_REQUIRED_BYTES`         | `4294967296` |
    /// | `GPU_HEADROOM_TIMEOUT_SECS`  | `120`        |
    /// | `GPU_POLL_INTERVAL_SECS`     | `2`          |
    /// | `GPU_EVICT_INTERVAL_SECS`    | `5`          |
    /// | `OLLAMA_NUM_CTX`             | `8192`       |
    /// | `TRANSLATE_MAX_INPUT_CHARS`  | `4000`       |
    /// | `TRANSLATE_MIN_SOURCE_CHARS` | `50`         |
    /// | `JOB_LOG_CAPACITY`           | `1000`       |
    pub fn from_env() -> Self {
        let d = Self::default();
        let secs = |name: &str, default: Duration| {
            Duration::from_secs(env_or(name, default.as_secs()))
        };

        Self {
            output_folder: std::env::var("OUTPUT_FOLDER")
                .map(PathBuf::from)
                .unwrap_or(d.output_folder),
            analysis_binary: std::env::var("ANALYSIS_BINARY").unwrap_or(d.analysis_binary),
            analysis_timeout: secs("ANALYSIS_TIMEOUT_SECS", d.analysis_timeout),
            pool_size: env_or("WORKER_POOL_SIZE", d.pool_size).max(1),
            queue_capacity: env_or("WORKER_QUEUE_CAPACITY", d.queue_capacity),
            gpu_permit_timeout: secs("GPU_PERMIT_TIMEOUT_SECS", d.gpu_permit_timeout),
            gpu_required_bytes: env_or("GPU_REQUIRED_BYTES", d.gpu_required_bytes),
            headroom_timeout: secs("GPU_HEADROOM_TIMEOUT_SECS", d.headroom_timeout),
            headroom: HeadroomConfig {
                poll_interval: secs("GPU_POLL_INTERVAL_SECS", d.headroom.poll_interval),
                evict_interval: secs("GPU_EVICT_INTERVAL_SECS", d.headroom.evict_interval),
            },
            default_num_ctx: env_or("OLLAMA_NUM_CTX", d.default_num_ctx),
            max_input_chars: env_or("TRANSLATE_MAX_INPUT_CHARS", d.max_input_chars),
            min_source_chars: env_or("TRANSLATE_MIN_SOURCE_CHARS", d.min_source_chars),
            log_capacity: env_or("JOB_LOG_CAPACITY", d.log_capacity),
        }
    }
}

/// Read and parse an environment variable, keeping `default` when it is
/// unset or unparseable.
pub fn env_or<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, %default, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.pool_size, 2);
        assert_eq!(config.gpu_required_bytes, 4_294_967_296);
        assert_eq!(config.headroom.poll_interval, Duration::from_secs(2));
        assert_eq!(config.max_input_chars, 4000);
    }

    #[test]
    fn env_or_falls_back_on_garbage() {
        // Unique name so parallel tests do not interfere.
        std::env::set_var("YOMI_TEST_ENV_OR_GARBAGE", "not-a-number");
        assert_eq!(env_or("YOMI_TEST_ENV_OR_GARBAGE", 7usize), 7);
        std::env::set_var("YOMI_TEST_ENV_OR_GARBAGE", " 12 ");
        assert_eq!(env_or("YOMI_TEST_ENV_OR_GARBAGE", 7usize), 12);
        std::env::remove_var("YOMI_TEST_ENV_OR_GARBAGE");
    }

    #[test]
    fn env_or_keeps_default_when_unset() {
        assert_eq!(env_or("YOMI_TEST_ENV_OR_UNSET", 3u64), 3);
    }
}
