//! OpenTelemetry GenAI Semantic Convention attribute constants.
//!
//! These follow the OTel GenAI Semantic Conventions specification for
//! consistent LLM call instrumentation across the codebase. All constants
//! are string slices usable in `tracing::span!` and `tracing::info_span!`
//! field names.
//!
//! Span naming convention: `"{operation} {model}"` (e.g., `"chat gpt-4o-mini"`)

// --- Required attributes ---

/// The name of the operation being performed (e.g., "chat", "embeddings").
pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";

/// The name of the GenAI provider.
pub const GEN_AI_PROVIDER_NAME: &str = "gen_ai.provider.name";

// --- Recommended attributes ---

/// The model ID requested (e.g., "gpt-4o-mini").
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";

/// The sampling temperature for the request.
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";

/// The maximum number of output tokens requested.
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";

/// Total tokens consumed by the call.
pub const GEN_AI_USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";

// --- Agent-specific attributes ---

/// The unique identifier of the persona handling the conversation.
pub const GEN_AI_AGENT_ID: &str = "gen_ai.agent.id";

/// The mention name of the persona.
pub const GEN_AI_AGENT_NAME: &str = "gen_ai.agent.name";

// --- Operation name values ---

/// Standard chat completion operation.
pub const OP_CHAT: &str = "chat";

/// Embedding generation for retrieval.
pub const OP_EMBEDDINGS: &str = "embeddings";
