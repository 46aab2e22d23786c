//! Inbound webhook envelope and outbound reply shapes.
//!
//! The platform delivers `{actor, object, target}` where `object.content` is
//! itself a JSON document (`{"message": ...}`) requiring a second decode.
//! Parsing is pure serde and lives here; signature verification lives in
//! chorus-infra.

use serde::{Deserialize, Serialize};

use crate::error::WebhookError;

/// Who sent the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
}

/// The message object; `content` is a nested JSON string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageObject {
    pub id: String,
    pub content: String,
}

/// The room the message was posted in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
}

/// Raw inbound webhook envelope as delivered by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub actor: Actor,
    pub object: MessageObject,
    pub target: Target,
    #[serde(rename = "callbackUrl", skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

/// The nested payload inside `object.content`.
#[derive(Debug, Deserialize)]
struct ContentPayload {
    message: String,
}

/// A fully decoded inbound message, ready for the pipeline.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub actor_id: String,
    pub actor_name: String,
    pub room_token: String,
    pub message_id: String,
    pub text: String,
    pub callback_url: Option<String>,
}

impl InboundMessage {
    /// Decode the raw body: outer envelope, then the nested content JSON.
    ///
    /// Any missing required field or malformed JSON is a validation error;
    /// the caller rejects with 4xx and never runs the pipeline.
    pub fn from_bytes(body: &[u8]) -> Result<Self, WebhookError> {
        let envelope: WebhookEnvelope = serde_json::from_slice(body)
            .map_err(|e| WebhookError::MalformedEnvelope(e.to_string()))?;

        if envelope.actor.id.is_empty() {
            return Err(WebhookError::MissingField("actor.id"));
        }
        if envelope.target.id.is_empty() {
            return Err(WebhookError::MissingField("target.id"));
        }
        if envelope.object.id.is_empty() {
            return Err(WebhookError::MissingField("object.id"));
        }

        // Second decode: the message text is wrapped in its own JSON document.
        let content: ContentPayload = serde_json::from_str(&envelope.object.content)
            .map_err(|e| WebhookError::MalformedEnvelope(format!("object.content: {e}")))?;

        Ok(Self {
            actor_id: envelope.actor.id,
            actor_name: envelope.actor.name,
            room_token: envelope.target.id,
            message_id: envelope.object.id,
            text: content.message,
            callback_url: envelope.callback_url,
        })
    }
}

/// Outbound reply posted back to the caller-supplied callback URL or the
/// platform REST endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReply {
    pub message: String,
    #[serde(rename = "replyTo")]
    pub reply_to: String,
    pub success: bool,
}

impl OutboundReply {
    pub fn new(message: impl Into<String>, reply_to: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reply_to: reply_to.into(),
            success: true,
        }
    }
}
