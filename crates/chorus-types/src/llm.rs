//! LLM request/response types: chat completion, embeddings, usage telemetry.
//!
//! Wire shapes follow the OpenAI-compatible chat-completion and embedding
//! endpoints; clients live in chorus-infra.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in an LLM conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// Request to the chat-completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Response from the chat-completion endpoint, flattened to what the
/// pipeline needs.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub total_tokens: u32,
}

/// Request to the embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub input: String,
    pub model: String,
}

/// Response from the embedding endpoint, flattened.
#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub total_tokens: u32,
}

/// Errors from LLM endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("endpoint returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request timed out after {0}ms")]
    Timeout(u64),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("authentication failed")]
    AuthenticationFailed,
}

/// Which external endpoint a usage record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEndpoint {
    Completion,
    Embedding,
}

impl fmt::Display for UsageEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageEndpoint::Completion => write!(f, "completion"),
            UsageEndpoint::Embedding => write!(f, "embedding"),
        }
    }
}

impl FromStr for UsageEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completion" => Ok(UsageEndpoint::Completion),
            "embedding" => Ok(UsageEndpoint::Embedding),
            other => Err(format!("invalid usage endpoint: '{other}'")),
        }
    }
}

/// One telemetry row per external LLM call.
///
/// Telemetry writes are best-effort: a failed write is swallowed and must
/// never block the reply path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub endpoint: UsageEndpoint,
    pub model: String,
    pub total_tokens: u32,
    pub latency_ms: u64,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

impl UsageRecord {
    pub fn new(endpoint: UsageEndpoint, model: impl Into<String>, total_tokens: u32, latency_ms: u64, success: bool) -> Self {
        Self {
            endpoint,
            model: model.into(),
            total_tokens,
            latency_ms,
            success,
            created_at: Utc::now(),
        }
    }
}
