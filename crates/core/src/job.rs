//! Job lifecycle and configuration types.
//!
//! These are the values the admission layer hands to the orchestrator and
//! the values the registry exposes back to observers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a job.
///
/// Transitions are monotonic: `Running -> Complete` or `Running -> Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// Re-asserting the current status is not a transition and is rejected.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Running, JobStatus::Complete) | (JobStatus::Running, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Logs
// ---------------------------------------------------------------------------

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single append-only job log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Per-job sequence number, strictly increasing in append order.
    pub seq: u64,
    pub timestamp: Timestamp,
    pub message: String,
    pub level: LogLevel,
}

// ---------------------------------------------------------------------------
// Analysis configuration
// ---------------------------------------------------------------------------

/// Output format requested from the analysis tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Md,
    Html,
    Json,
    Csv,
    Pdf,
}

impl OutputFormat {
    /// Value passed to the analysis tool's `-f` flag.
    pub fn as_arg(self) -> &'static str {
        match self {
            OutputFormat::Md => "md",
            OutputFormat::Html => "html",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Pdf => "pdf",
        }
    }
}

/// Device class the analysis tool runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Cpu,
    Cuda,
    Mps,
}

impl DeviceClass {
    /// GPU-class jobs go through the arbiter; CPU jobs skip it entirely.
    pub fn is_gpu(self) -> bool {
        matches!(self, DeviceClass::Cuda | DeviceClass::Mps)
    }

    pub fn as_arg(self) -> &'static str {
        match self {
            DeviceClass::Cpu => "cpu",
            DeviceClass::Cuda => "cuda",
            DeviceClass::Mps => "mps",
        }
    }
}

impl FromStr for DeviceClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(DeviceClass::Cpu),
            "cuda" | "gpu" => Ok(DeviceClass::Cuda),
            "mps" => Ok(DeviceClass::Mps),
            other => Err(CoreError::Validation(format!(
                "Unknown device class: \"{other}\""
            ))),
        }
    }
}

/// Options forwarded to the analysis tool for every input file of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub format: OutputFormat,
    pub device: DeviceClass,
    pub visualize: bool,
    pub lite: bool,
    pub figure: bool,
    pub figure_letter: bool,
    pub ignore_line_break: bool,
    pub combine: bool,
    pub ignore_meta: bool,
}

// ---------------------------------------------------------------------------
// Translation configuration
// ---------------------------------------------------------------------------

/// Container used when a binary artifact (PDF) is translated into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextContainer {
    #[default]
    Html,
    Md,
    Txt,
    Json,
}

impl TextContainer {
    pub fn extension(self) -> &'static str {
        match self {
            TextContainer::Html => "html",
            TextContainer::Md => "md",
            TextContainer::Txt => "txt",
            TextContainer::Json => "json",
        }
    }
}

/// Default context window when a request does not specify one.
pub const DEFAULT_NUM_CTX: u32 = 8192;

/// Upper bound accepted for a requested context window.
const MAX_NUM_CTX: u32 = 262_144;

/// How produced artifacts should be translated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Target language code, e.g. `"fr"`.
    pub target_lang: String,
    /// LLM model identifier, e.g. `"qwen3:8b"`. Empty means the service
    /// default, filled in at admission.
    #[serde(default)]
    pub model: String,
    /// Optional system prompt template; `{target_lang}` is substituted.
    #[serde(default)]
    pub prompt_template: Option<String>,
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,
    #[serde(default)]
    pub pdf_container: TextContainer,
}

fn default_num_ctx() -> u32 {
    DEFAULT_NUM_CTX
}

impl TranslationConfig {
    pub fn validate(&self) -> Result<(), CoreError> {
        let lang = self.target_lang.trim();
        if lang.is_empty() {
            return Err(CoreError::Validation(
                "Target language must not be empty".to_string(),
            ));
        }
        if !lang.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
            return Err(CoreError::Validation(format!(
                "Target language \"{lang}\" may only contain letters and hyphens"
            )));
        }
        if self.model.trim().is_empty() {
            return Err(CoreError::Validation(
                "Model identifier must not be empty".to_string(),
            ));
        }
        if self.num_ctx == 0 || self.num_ctx > MAX_NUM_CTX {
            return Err(CoreError::Validation(format!(
                "Context window must be in 1..={MAX_NUM_CTX}"
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Job request
// ---------------------------------------------------------------------------

/// Everything needed to admit a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Input files, analysed in this order.
    pub input_files: Vec<String>,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// `None` when translation was not requested.
    #[serde(default)]
    pub translation: Option<TranslationConfig>,
}

impl JobRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.input_files.is_empty() {
            return Err(CoreError::Validation(
                "At least one input file is required".to_string(),
            ));
        }
        for (i, file) in self.input_files.iter().enumerate() {
            if file.trim().is_empty() {
                return Err(CoreError::Validation(format!(
                    "Input file at index {i} must not be empty"
                )));
            }
        }
        if let Some(translation) = &self.translation {
            translation.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
