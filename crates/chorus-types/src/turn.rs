//! Conversation turn types.
//!
//! Turns are append-only and immutable; they are removed only by a full room
//! reset or an external retention sweep.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of a turn in the conversation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
            TurnRole::System => write!(f, "system"),
        }
    }
}

impl FromStr for TurnRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            other => Err(format!("invalid turn role: '{other}'")),
        }
    }
}

/// One immutable row in a room's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub room_token: String,
    /// Platform user id of the author (the persona id string for assistants).
    pub user_id: String,
    pub role: TurnRole,
    pub content: String,
    /// Model that produced an assistant turn.
    pub model: Option<String>,
    /// Wall-clock latency of the completion call for an assistant turn.
    pub response_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// A user turn as received from the webhook.
    pub fn user(room_token: impl Into<String>, user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            room_token: room_token.into(),
            user_id: user_id.into(),
            role: TurnRole::User,
            content: content.into(),
            model: None,
            response_ms: None,
            created_at: Utc::now(),
        }
    }

    /// An assistant turn produced by a completion call.
    pub fn assistant(
        room_token: impl Into<String>,
        persona_id: &Uuid,
        content: impl Into<String>,
        model: impl Into<String>,
        response_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            room_token: room_token.into(),
            user_id: persona_id.to_string(),
            role: TurnRole::Assistant,
            content: content.into(),
            model: Some(model.into()),
            response_ms: Some(response_ms),
            created_at: Utc::now(),
        }
    }
}
