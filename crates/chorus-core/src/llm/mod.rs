//! LLM client trait definitions.
//!
//! Concrete HTTP clients live in chorus-infra; the pipeline only sees these
//! seams, which keeps completion and embedding stubbable in tests.

use chorus_types::llm::{
    CompletionRequest, CompletionResponse, EmbeddingResponse, LlmError,
};

/// Client for the external chat-completion endpoint.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait CompletionClient: Send + Sync {
    /// Send a completion request and receive the full response.
    ///
    /// Implementations must bound the call with a timeout; a hung endpoint
    /// surfaces as `LlmError::Timeout`, never as an indefinite wait.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}

/// Client for the external embedding endpoint.
pub trait Embedder: Send + Sync {
    /// Embed one text into a vector.
    fn embed(
        &self,
        input: &str,
        model: &str,
    ) -> impl std::future::Future<Output = Result<EmbeddingResponse, LlmError>> + Send;

    /// The dimensionality of the output vectors.
    fn dimension(&self) -> usize;
}
