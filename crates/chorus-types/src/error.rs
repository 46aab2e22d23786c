use thiserror::Error;

/// Errors from repository operations (used by trait definitions in chorus-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    /// Optimistic concurrency failure: the session row changed under us.
    #[error("version conflict: {0}")]
    Conflict(String),
}

/// Errors from inbound webhook verification and envelope parsing.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("missing nonce header")]
    MissingNonce,

    #[error("signature verification failed")]
    SignatureMismatch,

    #[error("invalid HMAC key: {0}")]
    InvalidKey(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

impl WebhookError {
    /// True for failures that must be rejected with 401 before any processing.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            WebhookError::MissingSignature
                | WebhookError::MissingNonce
                | WebhookError::SignatureMismatch
                | WebhookError::InvalidKey(_)
        )
    }
}

/// Errors from outbound reply delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("delivery request failed: {0}")]
    Http(String),

    #[error("delivery rejected with HTTP {0}")]
    Status(u16),

    #[error("delivery timed out after {0}ms")]
    Timeout(u64),
}
