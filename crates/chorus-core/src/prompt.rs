//! Prompt composition.
//!
//! Turns a persona, the room's onboarding context, the retrieved knowledge
//! chunks, and the conversation history into the message list sent to the
//! completion endpoint. Pure functions only; no IO.

use chorus_types::knowledge::RankedChunk;
use chorus_types::llm::Message;
use chorus_types::persona::BotPersona;
use chorus_types::session::QaPair;
use chorus_types::turn::{ConversationTurn, TurnRole};

const ONBOARDING_HEADER: &str = "--- Room setup (from onboarding) ---";
const KNOWLEDGE_HEADER: &str = "--- Reference material ---";
const BLOCK_FOOTER: &str = "---";

/// Build the system message: the persona's prompt, then the onboarding
/// answers and retrieved chunks in clearly delimited blocks. Blocks with
/// nothing to say are omitted entirely.
pub fn system_message(persona: &BotPersona, answers: &[QaPair], chunks: &[RankedChunk]) -> Message {
    let mut text = persona.system_prompt.clone();

    if !answers.is_empty() {
        text.push_str("\n\n");
        text.push_str(ONBOARDING_HEADER);
        for pair in answers {
            text.push_str(&format!("\n{}: {}", pair.question, pair.answer));
        }
        text.push('\n');
        text.push_str(BLOCK_FOOTER);
    }

    if !chunks.is_empty() {
        text.push_str("\n\n");
        text.push_str(KNOWLEDGE_HEADER);
        for (i, ranked) in chunks.iter().enumerate() {
            text.push_str(&format!("\n[{}] {}", i + 1, ranked.chunk.text));
        }
        text.push('\n');
        text.push_str(BLOCK_FOOTER);
    }

    Message::system(text)
}

/// Build the full chronological message list for a completion call.
///
/// `history` must already include the current user turn as its last
/// element; the pipeline appends the inbound turn before composing. System
/// turns in the log (reset confirmations and the like) are not replayed.
pub fn compose(
    persona: &BotPersona,
    answers: &[QaPair],
    chunks: &[RankedChunk],
    history: &[ConversationTurn],
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(system_message(persona, answers, chunks));
    for turn in history {
        match turn.role {
            TurnRole::User => messages.push(Message::user(turn.content.clone())),
            TurnRole::Assistant => messages.push(Message::assistant(turn.content.clone())),
            TurnRole::System => {}
        }
    }
    messages
}
