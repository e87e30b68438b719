//! Wire types for the Ollama REST API.

use serde::{Deserialize, Serialize};

/// Entry of `GET /api/tags`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

/// Entry of `GET /api/ps`: a model currently loaded into memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    /// Bytes of the model resident in accelerator memory.
    #[serde(default)]
    pub size_vram: u64,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PsResponse {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Sampling and runtime options forwarded to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatOptions {
    pub num_ctx: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            num_ctx: 8192,
            temperature: 0.1,
            top_p: 0.9,
            num_predict: 3000,
        }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    pub options: ChatOptions,
}

impl ChatRequest {
    /// Non-streaming request with a system and a user message.
    pub fn new(
        model: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        options: ChatOptions,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            stream: false,
            options,
        }
    }
}

/// Response of a non-streaming `POST /api/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: String,
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    /// Total generation time in nanoseconds, when reported.
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// Body of the unload request (`POST /api/generate` with `keep_alive: 0`).
#[derive(Debug, Serialize)]
pub(crate) struct UnloadRequest<'a> {
    pub model: &'a str,
    pub keep_alive: u32,
}
