//! Typed application configuration.
//!
//! `AppConfig` is the top-level `config.toml`, resolved once at startup.
//! Every setting has a serde default so a minimal file (secrets only) is
//! enough to boot. No component does its own ad-hoc settings lookup.

use secrecy::SecretString;
use serde::Deserialize;

/// Top-level configuration for the Chorus service.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub webhook: WebhookConfig,
    pub completion: CompletionConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Inbound webhook authentication settings.
#[derive(Debug, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC-SHA256 secret for inbound verification and reply signing.
    pub secret: SecretString,
}

/// Chat-completion endpoint settings.
#[derive(Debug, Deserialize)]
pub struct CompletionConfig {
    /// Base URL of the OpenAI-compatible completion API.
    pub base_url: String,
    pub api_key: SecretString,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_completion_timeout_ms")]
    pub timeout_ms: u64,
}

/// Embedding endpoint settings.
#[derive(Debug, Deserialize)]
pub struct EmbeddingConfig {
    /// Base URL of the embedding API.
    pub base_url: String,
    pub api_key: SecretString,
    /// Output dimensionality; must match the knowledge store's table schema.
    #[serde(default = "default_embedding_dimension")]
    pub dimension: u32,
    #[serde(default = "default_embedding_timeout_ms")]
    pub timeout_ms: u64,
}

/// Retrieval defaults applied when a persona does not override them.
#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    /// Chunks retrieved per turn when the persona config has no top-K.
    #[serde(default = "default_top_k")]
    pub default_top_k: u32,
    /// Minimum cosine similarity in [0, 1]; chunks below it are dropped.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    /// Conversation turns included in the completion context window.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            history_limit: default_history_limit(),
        }
    }
}

/// Outbound reply delivery settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Platform REST base used when the webhook carries no callback URL.
    /// Replies go to `{platform_base_url}/rooms/{room_token}/messages`.
    #[serde(default)]
    pub platform_base_url: Option<String>,
    #[serde(default = "default_dispatch_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            platform_base_url: None,
            timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    0.95
}

fn default_completion_timeout_ms() -> u64 {
    30_000
}

fn default_embedding_dimension() -> u32 {
    1536
}

fn default_embedding_timeout_ms() -> u64 {
    10_000
}

fn default_top_k() -> u32 {
    3
}

fn default_min_similarity() -> f32 {
    0.25
}

fn default_history_limit() -> u32 {
    20
}

fn default_dispatch_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[webhook]
secret = "shhh"

[completion]
base_url = "https://llm.example/v1"
api_key = "sk-test"

[embedding]
base_url = "https://llm.example/v1"
api_key = "sk-test"
"#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.completion.max_tokens, 1024);
        assert!((config.completion.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.completion.timeout_ms, 30_000);
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.rag.default_top_k, 3);
        assert!((config.rag.min_similarity - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.rag.history_limit, 20);
        assert!(config.dispatch.platform_base_url.is_none());
    }

    #[test]
    fn test_overrides_are_honored() {
        let toml_str = format!(
            "{MINIMAL}\n[rag]\ndefault_top_k = 5\nmin_similarity = 0.4\n\n[dispatch]\nplatform_base_url = \"https://platform.example\"\n"
        );
        let config: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.rag.default_top_k, 5);
        assert!((config.rag.min_similarity - 0.4).abs() < f32::EPSILON);
        assert_eq!(
            config.dispatch.platform_base_url.as_deref(),
            Some("https://platform.example")
        );
    }

    #[test]
    fn test_missing_secret_fails_to_parse() {
        let err = toml::from_str::<AppConfig>("[completion]\nbase_url = \"x\"\napi_key = \"k\"\n");
        assert!(err.is_err());
    }
}
