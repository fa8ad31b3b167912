//! Wire types for the server's OpenAI-style HTTP API.
//!
//! Request bodies are built from an explicit model/prompt/messages plus a
//! validated [`RequestParameters`]. Response types are what the gateway hands
//! back after it has decided, once, that the body is usable.

use serde::{Deserialize, Serialize};

use super::parameters::RequestParameters;

// ─── Messages ────────────────────────────────────────────────────────────────

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    /// Some servers send `null` content on empty assistant turns.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// ─── Request Types ───────────────────────────────────────────────────────────

/// Request body for `POST /v1/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    #[serde(flatten)]
    pub parameters: RequestParameters,
}

/// Request body for `POST /v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub parameters: RequestParameters,
}

/// Request body for `POST /v1/embeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
}

// ─── Response Types ──────────────────────────────────────────────────────────

/// Token accounting reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One choice of a text completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response body of `POST /v1/completions`.
///
/// The gateway only returns this when `choices` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl CompletionResponse {
    /// Text of the first choice, trimmed.
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.text.trim())
            .unwrap_or_default()
    }
}

/// One choice of a chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Response body of `POST /v1/chat/completions`.
///
/// The gateway only returns this when `choices` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Content of the first choice's message.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }
}

/// One embedding vector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: u32,
    pub embedding: Vec<f32>,
}

/// Response body of `POST /v1/embeddings`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
}

/// Response body of `GET /v1/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

/// One loaded model as reported by `GET /v1/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

// ─── Streaming Types ─────────────────────────────────────────────────────────

/// Raw SSE chunk from a streamed completion or chat completion.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingChunk {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<StreamingChoice>,
}

/// A single choice within a streaming chunk.
///
/// Completions stream `text`; chat completions stream `delta.content`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingChoice {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub delta: Option<StreamingDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental update within a chat choice.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamingDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// One decoded piece of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDelta {
    /// Incremental text (may be empty on the final chunk).
    pub text: String,
    /// Why the model stopped, on the last chunk.
    pub finish_reason: Option<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
