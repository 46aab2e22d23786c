//! Room session types and the onboarding state machine's data shape.
//!
//! The onboarding state is a tagged union serialized into a JSON column and
//! validated on load -- an unexpected shape fails fast instead of being
//! silently coerced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::persona::MentionMode;

/// One answered onboarding question, stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Onboarding dialogue state for a room.
///
/// Serialized with a `stage` tag so each sub-state carries exactly the data
/// it needs. Collected answers travel with the state until completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum OnboardingState {
    NotStarted,
    AskingGroupOrDm,
    /// Group rooms only; DM rooms skip straight past this stage.
    AskingMentionPolicy,
    /// DM rooms whose user already completed a DM onboarding are offered
    /// their previous configuration before any questions are asked.
    ReusePrompt {
        offered_mention_mode: MentionMode,
        offered_answers: Vec<QaPair>,
    },
    AskingCustomQuestion {
        index: u32,
        answers: Vec<QaPair>,
    },
    Completed {
        answers: Vec<QaPair>,
    },
}

impl OnboardingState {
    /// Ordering key for the monotonic-stage invariant.
    ///
    /// The first component is the stage order, the second disambiguates
    /// successive custom questions. A transition is legal only if the rank
    /// never decreases (except through an explicit reset).
    pub fn rank(&self) -> (u8, u32) {
        match self {
            OnboardingState::NotStarted => (0, 0),
            OnboardingState::AskingGroupOrDm => (1, 0),
            OnboardingState::AskingMentionPolicy => (2, 0),
            OnboardingState::ReusePrompt { .. } => (2, 0),
            OnboardingState::AskingCustomQuestion { index, .. } => (3, *index),
            OnboardingState::Completed { .. } => (4, 0),
        }
    }

    /// The Q&A pairs collected so far, if any.
    pub fn answers(&self) -> &[QaPair] {
        match self {
            OnboardingState::AskingCustomQuestion { answers, .. }
            | OnboardingState::Completed { answers } => answers,
            _ => &[],
        }
    }
}

/// Per-room binding and onboarding state.
///
/// Created lazily on the first webhook for a room; `version` implements
/// optimistic concurrency (compare-and-swap on update) so concurrent
/// webhooks for the same room cannot lose state transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSession {
    /// Messaging-platform identifier for the conversation thread.
    pub room_token: String,
    /// The persona this room is bound to; None until resolved.
    pub persona_id: Option<Uuid>,
    /// Whether the room is a group chat; None until answered in onboarding.
    pub is_group: Option<bool>,
    /// For DM rooms, the platform user on the other end. Lets a user's next
    /// DM room offer to reuse their previous onboarding answers.
    pub dm_user_id: Option<String>,
    pub mention_mode: MentionMode,
    pub onboarding_done: bool,
    pub state: OnboardingState,
    /// Optimistic concurrency counter, incremented on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomSession {
    /// A fresh, unbound session for a room seen for the first time.
    pub fn new(room_token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            room_token: room_token.into(),
            persona_id: None,
            is_group: None,
            dm_user_id: None,
            mention_mode: MentionMode::Always,
            onboarding_done: false,
            state: OnboardingState::NotStarted,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
