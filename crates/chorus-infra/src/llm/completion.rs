//! HTTP chat-completion client for an OpenAI-compatible endpoint.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is only exposed
//! when constructing the Authorization header. It never appears in Debug
//! output or tracing logs.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use chorus_core::llm::CompletionClient;
use chorus_types::config::CompletionConfig;
use chorus_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Client for `POST {base_url}/v1/chat/completions`.
pub struct HttpCompletionClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    timeout_ms: u64,
}

// HttpCompletionClient intentionally does NOT derive Debug so the key can
// never be printed, even indirectly.

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LlmError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    model: String,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: String,
}

#[derive(Deserialize)]
struct WireUsage {
    total_tokens: u32,
}

impl CompletionClient for HttpCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_ms)
                } else {
                    LlmError::Http(format!("completion request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => LlmError::AuthenticationFailed,
                code => LlmError::Api {
                    status: code,
                    message: error_body,
                },
            });
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let content = wire
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Deserialization("response has no choices".to_string()))?;

        Ok(CompletionResponse {
            content,
            model: wire.model,
            total_tokens: wire.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}
