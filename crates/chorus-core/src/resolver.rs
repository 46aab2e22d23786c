//! Bot resolver: decides which persona owns a room for an inbound message.
//!
//! Pure decision logic; the pipeline performs the side effects (deleting
//! state on reset, persisting a new binding). Decision order is fixed:
//! reset token, then redirect for foreign mentions in bound rooms, then
//! mention gating, then binding for unbound rooms.

use chorus_types::persona::{BotPersona, MentionMode};
use chorus_types::session::RoomSession;

/// Literal token that wipes a room's session and history.
/// Matched case-insensitively anywhere in the message, before anything else.
pub const RESET_TOKEN: &str = "/reset";

/// Confirmation sent after a successful reset.
pub const RESET_CONFIRMATION: &str =
    "This room has been reset. Say anything to start over.";

/// How the resolved persona came to own the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// The room was already bound to this persona.
    Existing,
    /// This message bound the persona; the caller must persist it.
    New,
}

/// Outcome of resolving an inbound message against a room session.
#[derive(Debug, Clone)]
pub enum Resolution {
    /// Reset token present: delete the session and all turns, confirm, stop.
    Reset,
    /// A different persona was mentioned in a bound room: reply with the
    /// redirect notice, mutate nothing, stop.
    Redirect { bound_name: String },
    /// Mention policy not satisfied: no reply, no side effect, HTTP 200.
    Ignore,
    /// No persona is registered at all; nothing can own the room.
    NoPersona,
    /// Continue the pipeline with this persona.
    Proceed { persona: BotPersona, binding: Binding },
}

/// The redirect notice for a room owned by another persona.
pub fn redirect_notice(bound_name: &str) -> String {
    format!("This room is assigned to @{bound_name}. Mention @{bound_name} to talk here.")
}

/// Resolve which persona (if any) handles this message.
///
/// `personas` must be ordered by creation time ascending; the unbound-room
/// scan depends on it and the deterministic fallback is `personas[0]`.
pub fn resolve(session: &RoomSession, text: &str, personas: &[BotPersona]) -> Resolution {
    // Reset precedes everything, including authentication of a binding.
    if text.to_lowercase().contains(RESET_TOKEN) {
        return Resolution::Reset;
    }

    if let Some(bound_id) = session.persona_id {
        let Some(bound) = personas.iter().find(|p| p.id == bound_id) else {
            // The admin deleted the bound persona out from under the room.
            tracing::warn!(room = %session.room_token, persona_id = %bound_id, "bound persona no longer registered");
            return Resolution::NoPersona;
        };

        // A foreign mention never rebinds; it only triggers the notice.
        if let Some(other) = personas
            .iter()
            .find(|p| p.id != bound_id && p.is_mentioned_in(text))
        {
            tracing::debug!(room = %session.room_token, mentioned = %other.mention_name, bound = %bound.mention_name, "redirecting foreign persona mention");
            return Resolution::Redirect {
                bound_name: bound.mention_name.clone(),
            };
        }

        // Mention gating applies only to fully onboarded rooms.
        if session.onboarding_done
            && session.mention_mode == MentionMode::OnMention
            && !bound.is_mentioned_in(text)
        {
            return Resolution::Ignore;
        }

        return Resolution::Proceed {
            persona: bound.clone(),
            binding: Binding::Existing,
        };
    }

    // Unbound room: first mentioned persona in creation order wins;
    // otherwise the oldest persona, so every room eventually has an owner.
    if personas.is_empty() {
        return Resolution::NoPersona;
    }
    let persona = personas
        .iter()
        .find(|p| p.is_mentioned_in(text))
        .unwrap_or(&personas[0]);

    Resolution::Proceed {
        persona: persona.clone(),
        binding: Binding::New,
    }
}
