//! Onboarding dialogue engine.
//!
//! A pure finite-state transition function over `OnboardingState`:
//! `advance(session, text, ...)` returns the updated session and the
//! outbound prompt. Unparsable input never advances the stage; it returns
//! the stage's clarification prompt and leaves everything unchanged.
//!
//! The pipeline persists the returned session *before* dispatching the
//! reply, so a crash between the two loses only the prompt, never progress.

use chorus_types::persona::{BotPersona, MentionMode};
use chorus_types::session::{OnboardingState, QaPair, RoomSession};

/// First question of every onboarding, asked verbatim after a reset too.
pub const GROUP_PROMPT: &str = "Hi! Before we start: is this a group chat? (yes/no)";

const GROUP_CLARIFICATION: &str =
    "Sorry, I didn't catch that. Is this a group chat? Please answer yes or no.";

const MENTION_POLICY_PROMPT: &str =
    "Should I reply to every message here, or only when someone mentions me? (always/mention)";

const MENTION_POLICY_CLARIFICATION: &str =
    "Please answer 'always' to have me reply to everything, or 'mention' to have me reply only when mentioned.";

const REUSE_CLARIFICATION: &str =
    "Please answer 'use' to keep your previous setup, or 'reset' to answer the questions again.";

/// Result of one onboarding step: the session to persist and the reply.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub session: RoomSession,
    pub reply: String,
}

/// Parse a yes/no answer. Exact tokens and known synonyms only; anything
/// else is unparsed, never guessed.
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let token = text.trim().trim_end_matches(['.', '!', '?']).to_lowercase();
    match token.as_str() {
        "yes" | "y" | "yeah" | "yep" | "yup" | "sure" | "ok" | "okay" => Some(true),
        "no" | "n" | "nope" | "nah" => Some(false),
        _ => None,
    }
}

/// Parse a mention-policy answer.
fn parse_mention_policy(text: &str) -> Option<MentionMode> {
    let token = text.trim().trim_end_matches(['.', '!', '?']).to_lowercase();
    match token.as_str() {
        "always" | "every" | "all" | "everything" => Some(MentionMode::Always),
        "mention" | "mentions" | "on_mention" | "on mention" | "only when mentioned"
        | "when mentioned" => Some(MentionMode::OnMention),
        _ => None,
    }
}

/// Offer text shown to a DM user with a previously completed DM setup.
fn reuse_offer(answers: &[QaPair]) -> String {
    let mut text = String::from(
        "You've set me up in a direct chat before. Want to reuse those answers?\n",
    );
    for pair in answers {
        text.push_str(&format!("- {}: {}\n", pair.question, pair.answer));
    }
    text.push_str("Answer 'use' to keep them, or 'reset' to start fresh.");
    text
}

/// Persona-specific welcome summarizing the room's configuration.
fn welcome(persona: &BotPersona, mention_mode: MentionMode, answers: &[QaPair]) -> String {
    let mut text = format!("All set! I'm @{}.", persona.mention_name);
    match mention_mode {
        MentionMode::Always => text.push_str(" I'll reply to every message here."),
        MentionMode::OnMention => text.push_str(&format!(
            " I'll reply when you mention @{}.",
            persona.mention_name
        )),
    }
    if !answers.is_empty() {
        text.push_str("\nHere's what I noted:");
        for pair in answers {
            text.push_str(&format!("\n- {}: {}", pair.question, pair.answer));
        }
    }
    text
}

/// Advance the onboarding dialogue by one user message.
///
/// `prior_dm` is the user's most recent *completed* DM session (excluding
/// this room), used for the reuse offer. The returned session must be
/// persisted before the reply is dispatched.
pub fn advance(
    session: &RoomSession,
    text: &str,
    persona: &BotPersona,
    actor_id: &str,
    prior_dm: Option<&RoomSession>,
) -> StepOutcome {
    let mut next = session.clone();

    match &session.state {
        OnboardingState::NotStarted => {
            // The triggering message's content is irrelevant; onboarding
            // always opens with the group question.
            next.state = OnboardingState::AskingGroupOrDm;
            StepOutcome {
                session: next,
                reply: GROUP_PROMPT.to_string(),
            }
        }

        OnboardingState::AskingGroupOrDm => match parse_yes_no(text) {
            Some(true) => {
                next.is_group = Some(true);
                next.state = OnboardingState::AskingMentionPolicy;
                StepOutcome {
                    session: next,
                    reply: MENTION_POLICY_PROMPT.to_string(),
                }
            }
            Some(false) => {
                next.is_group = Some(false);
                next.dm_user_id = Some(actor_id.to_string());
                // DM rooms skip the mention-policy stage entirely.
                match prior_dm {
                    Some(prior) if !prior.state.answers().is_empty() => {
                        let offered = prior.state.answers().to_vec();
                        let reply = reuse_offer(&offered);
                        next.state = OnboardingState::ReusePrompt {
                            offered_mention_mode: prior.mention_mode,
                            offered_answers: offered,
                        };
                        StepOutcome { session: next, reply }
                    }
                    _ => begin_questions(next, persona),
                }
            }
            None => StepOutcome {
                session: next,
                reply: GROUP_CLARIFICATION.to_string(),
            },
        },

        OnboardingState::AskingMentionPolicy => match parse_mention_policy(text) {
            Some(mode) => {
                next.mention_mode = mode;
                begin_questions(next, persona)
            }
            None => StepOutcome {
                session: next,
                reply: MENTION_POLICY_CLARIFICATION.to_string(),
            },
        },

        OnboardingState::ReusePrompt {
            offered_mention_mode,
            offered_answers,
        } => {
            let token = text.trim().to_lowercase();
            if token == "use" {
                next.mention_mode = *offered_mention_mode;
                complete(next, persona, offered_answers.clone())
            } else if token == "reset" {
                // Discard the offer and run the normal question flow.
                begin_questions(next, persona)
            } else {
                StepOutcome {
                    session: next,
                    reply: REUSE_CLARIFICATION.to_string(),
                }
            }
        }

        OnboardingState::AskingCustomQuestion { index, answers } => {
            let questions = persona.questions_for(session.is_group.unwrap_or(false));
            let index = *index as usize;
            let Some(question) = questions.get(index) else {
                // Question list shrank under a live session; close it out.
                return complete(next, persona, answers.clone());
            };
            if text.trim().is_empty() {
                return StepOutcome {
                    session: next,
                    reply: format!("Please give an answer to: {question}"),
                };
            }
            let mut answers = answers.clone();
            answers.push(QaPair {
                question: question.clone(),
                answer: text.trim().to_string(),
            });
            if index + 1 < questions.len() {
                let reply = questions[index + 1].clone();
                next.state = OnboardingState::AskingCustomQuestion {
                    index: (index + 1) as u32,
                    answers,
                };
                StepOutcome { session: next, reply }
            } else {
                complete(next, persona, answers)
            }
        }

        OnboardingState::Completed { .. } => {
            // The pipeline never routes messages here; answer idempotently.
            StepOutcome {
                session: next,
                reply: welcome(persona, session.mention_mode, session.state.answers()),
            }
        }
    }
}

/// Move into the custom-question phase, or straight to completion when the
/// persona has no questions for this room kind.
fn begin_questions(mut session: RoomSession, persona: &BotPersona) -> StepOutcome {
    let questions = persona.questions_for(session.is_group.unwrap_or(false));
    match questions.first() {
        Some(first) => {
            let reply = first.clone();
            session.state = OnboardingState::AskingCustomQuestion {
                index: 0,
                answers: vec![],
            };
            StepOutcome { session, reply }
        }
        None => complete(session, persona, vec![]),
    }
}

/// Finalize onboarding: DM rooms default to always-respond, all Q&A pairs
/// become the room's onboarding context, and the welcome summarizes them.
fn complete(mut session: RoomSession, persona: &BotPersona, answers: Vec<QaPair>) -> StepOutcome {
    if session.is_group != Some(true) {
        session.mention_mode = MentionMode::Always;
    }
    session.onboarding_done = true;
    let reply = welcome(persona, session.mention_mode, &answers);
    session.state = OnboardingState::Completed { answers };
    StepOutcome { session, reply }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn persona_with(group_questions: &[&str], dm_questions: &[&str]) -> BotPersona {
        BotPersona {
            id: Uuid::now_v7(),
            mention_name: "edu".to_string(),
            system_prompt: "You are edu.".to_string(),
            completion_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            rag_top_k: None,
            group_questions: group_questions.iter().map(|s| s.to_string()).collect(),
            dm_questions: dm_questions.iter().map(|s| s.to_string()).collect(),
            created_at: Utc::now(),
        }
    }

    fn fresh_session() -> RoomSession {
        RoomSession::new("room-1")
    }

    #[test]
    fn test_yes_no_parsing() {
        for token in ["yes", "YES", "y", "yeah", "yep.", "sure!", "okay"] {
            assert_eq!(parse_yes_no(token), Some(true), "{token}");
        }
        for token in ["no", "n", "Nope", "nah."] {
            assert_eq!(parse_yes_no(token), Some(false), "{token}");
        }
        for token in ["maybe", "yes please", "", "si"] {
            assert_eq!(parse_yes_no(token), None, "{token:?}");
        }
    }

    #[test]
    fn test_first_message_always_asks_group_question() {
        let persona = persona_with(&[], &[]);
        let outcome = advance(&fresh_session(), "hello", &persona, "u-1", None);
        assert_eq!(outcome.reply, GROUP_PROMPT);
        assert_eq!(outcome.session.state, OnboardingState::AskingGroupOrDm);
    }

    #[test]
    fn test_unparsed_answer_never_advances_and_clarifies() {
        let persona = persona_with(&["Q1"], &[]);
        let mut session = fresh_session();
        session.state = OnboardingState::AskingGroupOrDm;

        let outcome = advance(&session, "what do you mean", &persona, "u-1", None);
        assert_eq!(outcome.session.state, OnboardingState::AskingGroupOrDm);
        assert_eq!(outcome.reply, GROUP_CLARIFICATION);

        // The clarification is stable across repeats.
        let again = advance(&outcome.session, "still confused", &persona, "u-1", None);
        assert_eq!(again.reply, GROUP_CLARIFICATION);
        assert_eq!(again.session.state, OnboardingState::AskingGroupOrDm);
    }

    // Group room: "yes" -> mention policy, "always" -> first custom
    // question, mention_mode ends up always.
    #[test]
    fn test_group_room_full_flow() {
        let persona = persona_with(&["What subject is this room about?"], &[]);
        let mut session = fresh_session();
        session.state = OnboardingState::AskingGroupOrDm;

        let outcome = advance(&session, "yes", &persona, "u-1", None);
        assert_eq!(outcome.session.is_group, Some(true));
        assert_eq!(outcome.session.state, OnboardingState::AskingMentionPolicy);
        assert_eq!(outcome.reply, MENTION_POLICY_PROMPT);

        let outcome = advance(&outcome.session, "always", &persona, "u-1", None);
        assert_eq!(outcome.session.mention_mode, MentionMode::Always);
        assert_eq!(outcome.reply, "What subject is this room about?");

        let outcome = advance(&outcome.session, "biology", &persona, "u-1", None);
        assert!(outcome.session.onboarding_done);
        assert_eq!(
            outcome.session.state.answers(),
            &[QaPair {
                question: "What subject is this room about?".to_string(),
                answer: "biology".to_string(),
            }]
        );
        assert!(outcome.reply.contains("biology"));
    }

    #[test]
    fn test_group_room_on_mention_policy() {
        let persona = persona_with(&[], &[]);
        let mut session = fresh_session();
        session.is_group = Some(true);
        session.state = OnboardingState::AskingMentionPolicy;

        let outcome = advance(&session, "mention", &persona, "u-1", None);
        assert!(outcome.session.onboarding_done);
        assert_eq!(outcome.session.mention_mode, MentionMode::OnMention);
        assert!(outcome.reply.contains("mention @edu"));
    }

    #[test]
    fn test_dm_room_skips_mention_policy_and_defaults_always() {
        let persona = persona_with(&[], &["What topic interests you?"]);
        let mut session = fresh_session();
        session.state = OnboardingState::AskingGroupOrDm;

        let outcome = advance(&session, "no", &persona, "u-7", None);
        assert_eq!(outcome.session.is_group, Some(false));
        assert_eq!(outcome.session.dm_user_id.as_deref(), Some("u-7"));
        assert_eq!(outcome.reply, "What topic interests you?");

        let outcome = advance(&outcome.session, "rust", &persona, "u-7", None);
        assert!(outcome.session.onboarding_done);
        assert_eq!(outcome.session.mention_mode, MentionMode::Always);
    }

    fn prior_dm_session() -> RoomSession {
        let mut prior = RoomSession::new("room-old");
        prior.is_group = Some(false);
        prior.dm_user_id = Some("u-7".to_string());
        prior.onboarding_done = true;
        prior.mention_mode = MentionMode::Always;
        prior.state = OnboardingState::Completed {
            answers: vec![
                QaPair { question: "Q1".to_string(), answer: "research".to_string() },
                QaPair { question: "Q2".to_string(), answer: "chemistry".to_string() },
            ],
        };
        prior
    }

    // Prior DM answers are offered and "use" completes onboarding
    // immediately with everything copied.
    #[test]
    fn test_dm_reuse_flow_use() {
        let persona = persona_with(&[], &["Q1", "Q2"]);
        let prior = prior_dm_session();
        let mut session = fresh_session();
        session.state = OnboardingState::AskingGroupOrDm;

        let outcome = advance(&session, "no", &persona, "u-7", Some(&prior));
        assert!(matches!(outcome.session.state, OnboardingState::ReusePrompt { .. }));
        assert!(outcome.reply.contains("research"));
        assert!(outcome.reply.contains("chemistry"));

        let outcome = advance(&outcome.session, "use", &persona, "u-7", Some(&prior));
        assert!(outcome.session.onboarding_done);
        assert_eq!(outcome.session.mention_mode, MentionMode::Always);
        assert_eq!(outcome.session.state.answers().len(), 2);
        assert_eq!(outcome.session.state.answers()[0].answer, "research");
    }

    #[test]
    fn test_dm_reuse_flow_reset_runs_normal_questions() {
        let persona = persona_with(&[], &["Q1", "Q2"]);
        let prior = prior_dm_session();
        let mut session = fresh_session();
        session.is_group = Some(false);
        session.state = OnboardingState::ReusePrompt {
            offered_mention_mode: prior.mention_mode,
            offered_answers: prior.state.answers().to_vec(),
        };

        let outcome = advance(&session, "reset", &persona, "u-7", Some(&prior));
        assert_eq!(outcome.reply, "Q1");
        assert_eq!(
            outcome.session.state,
            OnboardingState::AskingCustomQuestion { index: 0, answers: vec![] }
        );
    }

    #[test]
    fn test_dm_reuse_flow_other_input_reprompts() {
        let persona = persona_with(&[], &["Q1"]);
        let prior = prior_dm_session();
        let mut session = fresh_session();
        session.is_group = Some(false);
        session.state = OnboardingState::ReusePrompt {
            offered_mention_mode: prior.mention_mode,
            offered_answers: prior.state.answers().to_vec(),
        };

        let outcome = advance(&session, "hmm", &persona, "u-7", Some(&prior));
        assert_eq!(outcome.reply, REUSE_CLARIFICATION);
        assert!(matches!(outcome.session.state, OnboardingState::ReusePrompt { .. }));
    }

    #[test]
    fn test_custom_answers_stored_verbatim_in_order() {
        let persona = persona_with(&["Q1", "Q2"], &[]);
        let mut session = fresh_session();
        session.is_group = Some(true);
        session.state = OnboardingState::AskingCustomQuestion { index: 0, answers: vec![] };

        let outcome = advance(&session, "  First Answer! ", &persona, "u-1", None);
        assert_eq!(outcome.reply, "Q2");

        let outcome = advance(&outcome.session, "second", &persona, "u-1", None);
        assert!(outcome.session.onboarding_done);
        let answers = outcome.session.state.answers().to_vec();
        assert_eq!(answers[0].question, "Q1");
        assert_eq!(answers[0].answer, "First Answer!");
        assert_eq!(answers[1].answer, "second");
    }

    #[test]
    fn test_empty_custom_answer_reprompts() {
        let persona = persona_with(&["Q1"], &[]);
        let mut session = fresh_session();
        session.is_group = Some(true);
        session.state = OnboardingState::AskingCustomQuestion { index: 0, answers: vec![] };

        let outcome = advance(&session, "   ", &persona, "u-1", None);
        assert_eq!(outcome.reply, "Please give an answer to: Q1");
        assert_eq!(
            outcome.session.state,
            OnboardingState::AskingCustomQuestion { index: 0, answers: vec![] }
        );
    }

    #[test]
    fn test_stage_rank_never_decreases_across_any_transition() {
        let persona = persona_with(&["Q1", "Q2"], &["D1"]);
        let inputs = ["hello", "garbage", "yes", "what", "always", "ans1", "", "ans2"];
        let mut session = fresh_session();
        for input in inputs {
            let before = session.state.rank();
            let outcome = advance(&session, input, &persona, "u-1", None);
            assert!(
                outcome.session.state.rank() >= before,
                "stage went backwards on input {input:?}"
            );
            session = outcome.session;
        }
        assert!(session.onboarding_done);
    }

    // Reset semantics: a brand-new session replays the opening prompt verbatim.
    #[test]
    fn test_reset_replays_first_prompt_verbatim() {
        let persona = persona_with(&["Q1"], &[]);
        let first = advance(&fresh_session(), "hello", &persona, "u-1", None);
        let replay = advance(&fresh_session(), "anything else", &persona, "u-1", None);
        assert_eq!(first.reply, replay.reply);
        assert_eq!(first.reply, GROUP_PROMPT);
    }

    #[test]
    fn test_no_questions_completes_immediately() {
        let persona = persona_with(&[], &[]);
        let mut session = fresh_session();
        session.state = OnboardingState::AskingGroupOrDm;

        let outcome = advance(&session, "no", &persona, "u-1", None);
        assert!(outcome.session.onboarding_done);
        assert!(outcome.reply.starts_with("All set!"));
    }
}
