//! HTTP embedding client for an OpenAI-compatible endpoint.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use chorus_core::llm::Embedder;
use chorus_types::config::EmbeddingConfig;
use chorus_types::llm::{EmbeddingRequest, EmbeddingResponse, LlmError};

/// Client for `POST {base_url}/v1/embeddings`.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    dimension: usize,
    timeout_ms: u64,
}

// No Debug derive; the key stays out of logs.

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| LlmError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dimension: config.dimension as usize,
            timeout_ms: config.timeout_ms,
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }
}

#[derive(Deserialize)]
struct WireResponse {
    data: Vec<WireEmbedding>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireEmbedding {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct WireUsage {
    total_tokens: u32,
}

impl Embedder for HttpEmbeddingClient {
    async fn embed(&self, input: &str, model: &str) -> Result<EmbeddingResponse, LlmError> {
        let request = EmbeddingRequest {
            input: input.to_string(),
            model: model.to_string(),
        };

        let response = self
            .client
            .post(self.url())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout_ms)
                } else {
                    LlmError::Http(format!("embedding request failed: {e}"))
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

        let embedding = wire
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::Deserialization("response has no embeddings".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(LlmError::Deserialization(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                embedding.len()
            )));
        }

        Ok(EmbeddingResponse {
            embedding,
            total_tokens: wire.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
