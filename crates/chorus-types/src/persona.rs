//! Bot persona types.
//!
//! A persona is a configured bot identity (mention name, system prompt,
//! model choices, onboarding question lists) that can be bound to a room.
//! Personas are created by the admin subsystem and read-only to the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Policy determining whether a persona responds to every message in a room
/// or only when explicitly mentioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionMode {
    /// Respond to every message in the room.
    Always,
    /// Respond only when the persona's mention name appears in the message.
    OnMention,
}

impl fmt::Display for MentionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MentionMode::Always => write!(f, "always"),
            MentionMode::OnMention => write!(f, "on_mention"),
        }
    }
}

impl FromStr for MentionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(MentionMode::Always),
            "on_mention" => Ok(MentionMode::OnMention),
            other => Err(format!("invalid mention mode: '{other}'")),
        }
    }
}

/// A configured bot identity that can own rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotPersona {
    pub id: Uuid,
    /// Name users type to address this persona (matched as `@name`).
    pub mention_name: String,
    /// System prompt prepended to every completion request.
    pub system_prompt: String,
    /// Default chat-completion model for rooms bound to this persona.
    pub completion_model: String,
    /// Embedding model used for retrieval queries.
    pub embedding_model: String,
    /// Per-persona override of the number of knowledge chunks retrieved
    /// per turn; `None` falls back to the configured default.
    pub rag_top_k: Option<u32>,
    /// Ordered onboarding questions asked in group rooms.
    pub group_questions: Vec<String>,
    /// Ordered onboarding questions asked in direct-message rooms.
    pub dm_questions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl BotPersona {
    /// The onboarding question list for the given room kind.
    pub fn questions_for(&self, is_group: bool) -> &[String] {
        if is_group {
            &self.group_questions
        } else {
            &self.dm_questions
        }
    }

    /// Case-insensitive check whether `text` mentions this persona as `@name`.
    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let needle = format!("@{}", self.mention_name.to_lowercase());
        text.to_lowercase().contains(&needle)
    }
}
