//! The message pipeline: one verified webhook in, at most one reply out.
//!
//! Orchestrates resolver, onboarding, conversation log, retrieval, prompt
//! composition, completion, and dispatch behind the trait seams. Ordering
//! invariants live here: the user turn persists before any LLM call (fail
//! closed), the onboarding state persists before its prompt is dispatched,
//! and telemetry never blocks the reply.

use std::time::Instant;

use chorus_types::config::AppConfig;
use chorus_types::error::RepositoryError;
use chorus_types::llm::{CompletionRequest, UsageEndpoint, UsageRecord};
use chorus_types::persona::BotPersona;
use chorus_types::session::{OnboardingState, RoomSession};
use chorus_types::turn::ConversationTurn;
use chorus_types::webhook::{InboundMessage, OutboundReply};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::dispatch::ReplyDispatcher;
use crate::knowledge::KnowledgeStore;
use crate::llm::{CompletionClient, Embedder};
use crate::onboarding;
use crate::prompt;
use crate::repository::persona::PersonaRepository;
use crate::repository::session::SessionRepository;
use crate::repository::telemetry::TelemetryRepository;
use crate::repository::turn::TurnRepository;
use crate::resolver::{self, Binding, Resolution};
use crate::retrieval::RetrievalEngine;

/// Fixed reply when the completion endpoint fails. The user turn is already
/// persisted at that point, so the exchange is not lost.
pub const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

/// How a webhook was disposed of. All variants map to HTTP 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Completion succeeded and the reply was handed to the dispatcher.
    Replied,
    /// An onboarding prompt (or clarification) was sent.
    Onboarding,
    /// The room's session and history were wiped.
    Reset,
    /// A foreign persona was mentioned; the redirect notice was sent.
    Redirected,
    /// Mention policy not satisfied; nothing was sent.
    Ignored,
    /// No persona could own the room; nothing was sent.
    NoPersona,
    /// Completion failed; the fallback apology was sent.
    CompletionFailed,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Knobs the pipeline reads per message, resolved once from `AppConfig`.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub history_limit: u32,
    pub default_top_k: u32,
    pub min_similarity: f32,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_tokens: config.completion.max_tokens,
            temperature: config.completion.temperature,
            top_p: config.completion.top_p,
            history_limit: config.rag.history_limit,
            default_top_k: config.rag.default_top_k,
            min_similarity: config.rag.min_similarity,
        }
    }
}

pub struct MessagePipeline<S, T, P, C, D, M, E, K> {
    sessions: S,
    turns: T,
    personas: P,
    completion: C,
    dispatcher: D,
    telemetry: M,
    retrieval: RetrievalEngine<E, K, M>,
    settings: PipelineSettings,
}

impl<S, T, P, C, D, M, E, K> MessagePipeline<S, T, P, C, D, M, E, K>
where
    S: SessionRepository,
    T: TurnRepository,
    P: PersonaRepository,
    C: CompletionClient,
    D: ReplyDispatcher,
    M: TelemetryRepository + Clone,
    E: Embedder,
    K: KnowledgeStore,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: S,
        turns: T,
        personas: P,
        completion: C,
        embedder: E,
        knowledge: K,
        dispatcher: D,
        telemetry: M,
        settings: PipelineSettings,
    ) -> Self {
        let retrieval = RetrievalEngine::new(
            embedder,
            knowledge,
            telemetry.clone(),
            settings.default_top_k,
            settings.min_similarity,
        );
        Self {
            sessions,
            turns,
            personas,
            completion,
            dispatcher,
            telemetry,
            retrieval,
            settings,
        }
    }

    /// Process one verified inbound message end to end.
    ///
    /// Errors mean the message could not be safely handled (the platform
    /// may redeliver); every handled disposition returns an outcome.
    pub async fn handle(&self, message: &InboundMessage) -> Result<PipelineOutcome, PipelineError> {
        let personas = self.personas.list_by_creation().await?;

        // One reload-and-replay on a version conflict; a second conflict
        // propagates so the caller can surface it.
        let mut attempts = 0;
        loop {
            attempts += 1;
            let session = self.load_or_create_session(&message.room_token).await?;

            match resolver::resolve(&session, &message.text, &personas) {
                Resolution::Reset => return self.run_reset(message).await,
                Resolution::Redirect { bound_name } => {
                    self.send(&resolver::redirect_notice(&bound_name), message).await;
                    return Ok(PipelineOutcome::Redirected);
                }
                Resolution::Ignore => {
                    debug!(room = %message.room_token, "mention policy not satisfied, ignoring");
                    return Ok(PipelineOutcome::Ignored);
                }
                Resolution::NoPersona => {
                    warn!(room = %message.room_token, "no persona available for room");
                    return Ok(PipelineOutcome::NoPersona);
                }
                Resolution::Proceed { persona, binding } => {
                    if session.onboarding_done {
                        return self.run_completion(&session, &persona, message).await;
                    }
                    match self.run_onboarding(session, &persona, binding, message).await {
                        Err(PipelineError::Repository(RepositoryError::Conflict(_)))
                            if attempts == 1 =>
                        {
                            debug!(room = %message.room_token, "session version conflict, replaying");
                            continue;
                        }
                        other => return other,
                    }
                }
            }
        }
    }

    async fn load_or_create_session(
        &self,
        room_token: &str,
    ) -> Result<RoomSession, PipelineError> {
        if let Some(session) = self.sessions.get(room_token).await? {
            return Ok(session);
        }
        let fresh = RoomSession::new(room_token);
        match self.sessions.create(&fresh).await {
            Ok(()) => Ok(fresh),
            // A concurrent webhook won the insert race; use its row.
            Err(RepositoryError::Conflict(_)) => self
                .sessions
                .get(room_token)
                .await?
                .ok_or_else(|| RepositoryError::NotFound.into()),
            Err(error) => Err(error.into()),
        }
    }

    /// Wipe the room and confirm. Turns go first so a crash between the two
    /// deletes cannot leave history attached to a live session.
    async fn run_reset(&self, message: &InboundMessage) -> Result<PipelineOutcome, PipelineError> {
        let removed = self.turns.delete_room(&message.room_token).await?;
        self.sessions.delete(&message.room_token).await?;
        info!(room = %message.room_token, removed, "room reset");
        self.send(resolver::RESET_CONFIRMATION, message).await;
        Ok(PipelineOutcome::Reset)
    }

    async fn run_onboarding(
        &self,
        session: RoomSession,
        persona: &BotPersona,
        binding: Binding,
        message: &InboundMessage,
    ) -> Result<PipelineOutcome, PipelineError> {
        // The reuse offer only matters at the group-or-DM fork.
        let prior_dm = if matches!(session.state, OnboardingState::AskingGroupOrDm) {
            self.sessions
                .latest_completed_dm_for_user(&message.actor_id, &message.room_token)
                .await?
        } else {
            None
        };

        let step = onboarding::advance(
            &session,
            &message.text,
            persona,
            &message.actor_id,
            prior_dm.as_ref(),
        );
        let mut updated = step.session;
        if binding == Binding::New {
            updated.persona_id = Some(persona.id);
            info!(room = %message.room_token, persona = %persona.mention_name, "room bound");
        }

        // State persists before the prompt goes out; losing the prompt is
        // recoverable, double-advancing the dialogue is not.
        self.sessions.update_versioned(&updated).await?;
        self.send(&step.reply, message).await;
        Ok(PipelineOutcome::Onboarding)
    }

    async fn run_completion(
        &self,
        session: &RoomSession,
        persona: &BotPersona,
        message: &InboundMessage,
    ) -> Result<PipelineOutcome, PipelineError> {
        // Fail closed: no LLM call for a turn we could not persist.
        let user_turn =
            ConversationTurn::user(&message.room_token, &message.actor_id, &message.text);
        self.turns.append(&user_turn).await?;

        let history = match self
            .turns
            .recent_history(&message.room_token, self.settings.history_limit)
            .await
        {
            Ok(history) => history,
            Err(error) => {
                warn!(room = %message.room_token, %error, "history load failed, using current turn only");
                vec![user_turn.clone()]
            }
        };

        let answers = session.state.answers();
        let chunks = self
            .retrieval
            .retrieve(persona, answers, &history, &message.text)
            .await;
        let messages = prompt::compose(persona, answers, &chunks, &history);

        let request = CompletionRequest {
            model: persona.completion_model.clone(),
            messages,
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            top_p: Some(self.settings.top_p),
        };

        let span = info_span!(
            "gen_ai.complete",
            gen_ai.request.model = %request.model,
            gen_ai.request.max_tokens = request.max_tokens,
            gen_ai.request.temperature = ?request.temperature,
        );

        let started = Instant::now();
        let result = self.completion.complete(&request).instrument(span).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = UsageRecord::new(
            UsageEndpoint::Completion,
            &persona.completion_model,
            result.as_ref().map(|r| r.total_tokens).unwrap_or(0),
            latency_ms,
            result.is_ok(),
        );
        if let Err(error) = self.telemetry.record(&usage).await {
            warn!(%error, "failed to record completion usage");
        }

        match result {
            Ok(response) => {
                let assistant_turn = ConversationTurn::assistant(
                    &message.room_token,
                    &persona.id,
                    &response.content,
                    &response.model,
                    latency_ms,
                );
                // The reply still goes out if the assistant turn fails to
                // persist; the user already paid for the completion.
                if let Err(error) = self.turns.append(&assistant_turn).await {
                    warn!(room = %message.room_token, %error, "failed to persist assistant turn");
                }
                self.send(&response.content, message).await;
                Ok(PipelineOutcome::Replied)
            }
            Err(error) => {
                warn!(room = %message.room_token, %error, "completion failed, sending fallback");
                self.send(FALLBACK_REPLY, message).await;
                Ok(PipelineOutcome::CompletionFailed)
            }
        }
    }

    /// Dispatch a reply; delivery failure is logged and swallowed because
    /// the webhook already succeeded from the platform's point of view.
    async fn send(&self, text: &str, message: &InboundMessage) {
        let reply = OutboundReply::new(text, &message.message_id);
        if let Err(error) = self
            .dispatcher
            .deliver(&reply, &message.room_token, message.callback_url.as_deref())
            .await
        {
            warn!(room = %message.room_token, %error, "reply dispatch failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_types::error::DispatchError;
    use chorus_types::knowledge::{KnowledgeChunk, RankedChunk};
    use chorus_types::llm::{CompletionResponse, EmbeddingResponse, LlmError};
    use chorus_types::persona::MentionMode;
    use chorus_types::session::QaPair;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use uuid::Uuid;

    // In-memory fakes sharing state through Arc so tests can inspect them
    // after the pipeline consumed its clones.

    #[derive(Clone, Default)]
    struct MemSessions {
        rows: Arc<Mutex<HashMap<String, RoomSession>>>,
        conflict_once: Arc<AtomicBool>,
    }

    impl SessionRepository for MemSessions {
        async fn get(&self, room_token: &str) -> Result<Option<RoomSession>, RepositoryError> {
            Ok(self.rows.lock().unwrap().get(room_token).cloned())
        }

        async fn create(&self, session: &RoomSession) -> Result<(), RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            if rows.contains_key(&session.room_token) {
                return Err(RepositoryError::Conflict("exists".to_string()));
            }
            rows.insert(session.room_token.clone(), session.clone());
            Ok(())
        }

        async fn update_versioned(
            &self,
            session: &RoomSession,
        ) -> Result<RoomSession, RepositoryError> {
            if self.conflict_once.swap(false, Ordering::SeqCst) {
                return Err(RepositoryError::Conflict("stale".to_string()));
            }
            let mut rows = self.rows.lock().unwrap();
            let stored = rows
                .get(&session.room_token)
                .ok_or(RepositoryError::NotFound)?;
            if stored.version != session.version {
                return Err(RepositoryError::Conflict("stale".to_string()));
            }
            let mut updated = session.clone();
            updated.version += 1;
            updated.updated_at = Utc::now();
            rows.insert(session.room_token.clone(), updated.clone());
            Ok(updated)
        }

        async fn delete(&self, room_token: &str) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().remove(room_token);
            Ok(())
        }

        async fn latest_completed_dm_for_user(
            &self,
            user_id: &str,
            exclude_room: &str,
        ) -> Result<Option<RoomSession>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .values()
                .filter(|s| {
                    s.onboarding_done
                        && s.room_token != exclude_room
                        && s.dm_user_id.as_deref() == Some(user_id)
                })
                .max_by_key(|s| s.updated_at)
                .cloned())
        }

        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    #[derive(Clone, Default)]
    struct MemTurns {
        rows: Arc<Mutex<Vec<ConversationTurn>>>,
        fail_append: Arc<AtomicBool>,
    }

    impl TurnRepository for MemTurns {
        async fn append(&self, turn: &ConversationTurn) -> Result<Uuid, RepositoryError> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(RepositoryError::Query("disk full".to_string()));
            }
            self.rows.lock().unwrap().push(turn.clone());
            Ok(turn.id)
        }

        async fn recent_history(
            &self,
            room_token: &str,
            limit: u32,
        ) -> Result<Vec<ConversationTurn>, RepositoryError> {
            let rows = self.rows.lock().unwrap();
            let mut history: Vec<ConversationTurn> = rows
                .iter()
                .filter(|t| t.room_token == room_token)
                .cloned()
                .collect();
            let skip = history.len().saturating_sub(limit as usize);
            history.drain(..skip);
            Ok(history)
        }

        async fn delete_room(&self, room_token: &str) -> Result<u64, RepositoryError> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|t| t.room_token != room_token);
            Ok((before - rows.len()) as u64)
        }

        async fn count(&self) -> Result<u64, RepositoryError> {
            Ok(self.rows.lock().unwrap().len() as u64)
        }
    }

    #[derive(Clone, Default)]
    struct MemPersonas {
        rows: Arc<Mutex<Vec<BotPersona>>>,
    }

    impl PersonaRepository for MemPersonas {
        async fn list_by_creation(&self) -> Result<Vec<BotPersona>, RepositoryError> {
            let mut rows = self.rows.lock().unwrap().clone();
            rows.sort_by_key(|p| p.created_at);
            Ok(rows)
        }

        async fn get(&self, id: &Uuid) -> Result<Option<BotPersona>, RepositoryError> {
            Ok(self.rows.lock().unwrap().iter().find(|p| p.id == *id).cloned())
        }

        async fn find_by_mention(
            &self,
            mention_name: &str,
        ) -> Result<Option<BotPersona>, RepositoryError> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.mention_name == mention_name)
                .cloned())
        }

        async fn create(&self, persona: &BotPersona) -> Result<(), RepositoryError> {
            self.rows.lock().unwrap().push(persona.clone());
            Ok(())
        }
    }

    #[derive(Clone)]
    struct StubCompletion {
        fail: Arc<AtomicBool>,
        requests: Arc<Mutex<Vec<CompletionRequest>>>,
    }

    impl StubCompletion {
        fn new() -> Self {
            Self {
                fail: Arc::new(AtomicBool::new(false)),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl CompletionClient for StubCompletion {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(LlmError::Timeout(30_000));
            }
            Ok(CompletionResponse {
                content: "a thoughtful answer".to_string(),
                model: request.model.clone(),
                total_tokens: 42,
            })
        }
    }

    #[derive(Clone)]
    struct StubEmbedder;

    impl Embedder for StubEmbedder {
        async fn embed(&self, _input: &str, _model: &str) -> Result<EmbeddingResponse, LlmError> {
            Ok(EmbeddingResponse {
                embedding: vec![0.1; 4],
                total_tokens: 5,
            })
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    #[derive(Clone, Default)]
    struct MemKnowledge {
        chunks: Arc<Mutex<Vec<(KnowledgeChunk, Vec<f32>)>>>,
    }

    impl KnowledgeStore for MemKnowledge {
        async fn search(
            &self,
            persona_id: &Uuid,
            _query_embedding: &[f32],
            limit: usize,
            _min_similarity: f32,
        ) -> Result<Vec<RankedChunk>, RepositoryError> {
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| c.persona_id == *persona_id)
                .take(limit)
                .map(|(c, _)| RankedChunk {
                    chunk: c.clone(),
                    similarity: 0.9,
                    distance: 0.1,
                })
                .collect())
        }

        async fn add(
            &self,
            chunk: &KnowledgeChunk,
            embedding: &[f32],
        ) -> Result<(), RepositoryError> {
            self.chunks
                .lock()
                .unwrap()
                .push((chunk.clone(), embedding.to_vec()));
            Ok(())
        }

        async fn delete_persona(&self, persona_id: &Uuid) -> Result<u64, RepositoryError> {
            let mut chunks = self.chunks.lock().unwrap();
            let before = chunks.len();
            chunks.retain(|(c, _)| c.persona_id != *persona_id);
            Ok((before - chunks.len()) as u64)
        }

        async fn count(&self, persona_id: &Uuid) -> Result<u64, RepositoryError> {
            Ok(self
                .chunks
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| c.persona_id == *persona_id)
                .count() as u64)
        }
    }

    #[derive(Clone, Default)]
    struct MemDispatcher {
        sent: Arc<Mutex<Vec<(OutboundReply, String)>>>,
    }

    impl ReplyDispatcher for MemDispatcher {
        async fn deliver(
            &self,
            reply: &OutboundReply,
            room_token: &str,
            _callback_url: Option<&str>,
        ) -> Result<(), DispatchError> {
            self.sent
                .lock()
                .unwrap()
                .push((reply.clone(), room_token.to_string()));
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct MemTelemetry {
        records: Arc<Mutex<Vec<UsageRecord>>>,
    }

    impl TelemetryRepository for MemTelemetry {
        async fn record(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct Harness {
        sessions: MemSessions,
        turns: MemTurns,
        personas: MemPersonas,
        completion: StubCompletion,
        dispatcher: MemDispatcher,
        telemetry: MemTelemetry,
        knowledge: MemKnowledge,
        pipeline: MessagePipeline<
            MemSessions,
            MemTurns,
            MemPersonas,
            StubCompletion,
            MemDispatcher,
            MemTelemetry,
            StubEmbedder,
            MemKnowledge,
        >,
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.95,
            history_limit: 20,
            default_top_k: 3,
            min_similarity: 0.25,
        }
    }

    fn harness() -> Harness {
        let sessions = MemSessions::default();
        let turns = MemTurns::default();
        let personas = MemPersonas::default();
        let completion = StubCompletion::new();
        let dispatcher = MemDispatcher::default();
        let telemetry = MemTelemetry::default();
        let knowledge = MemKnowledge::default();
        let pipeline = MessagePipeline::new(
            sessions.clone(),
            turns.clone(),
            personas.clone(),
            completion.clone(),
            StubEmbedder,
            knowledge.clone(),
            dispatcher.clone(),
            telemetry.clone(),
            settings(),
        );
        Harness {
            sessions,
            turns,
            personas,
            completion,
            dispatcher,
            telemetry,
            knowledge,
            pipeline,
        }
    }

    fn persona(name: &str, group_questions: &[&str]) -> BotPersona {
        BotPersona {
            id: Uuid::now_v7(),
            mention_name: name.to_string(),
            system_prompt: format!("You are {name}."),
            completion_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            rag_top_k: None,
            group_questions: group_questions.iter().map(|s| s.to_string()).collect(),
            dm_questions: vec![],
            created_at: Utc::now(),
        }
    }

    fn inbound(room: &str, actor: &str, text: &str) -> InboundMessage {
        InboundMessage {
            actor_id: actor.to_string(),
            actor_name: "Pat".to_string(),
            room_token: room.to_string(),
            message_id: format!("msg-{}", Uuid::now_v7()),
            text: text.to_string(),
            callback_url: None,
        }
    }

    async fn seed_onboarded_room(h: &Harness, persona: &BotPersona, room: &str) {
        h.personas.create(persona).await.unwrap();
        let mut session = RoomSession::new(room);
        session.persona_id = Some(persona.id);
        session.is_group = Some(true);
        session.mention_mode = MentionMode::Always;
        session.onboarding_done = true;
        session.state = OnboardingState::Completed {
            answers: vec![QaPair {
                question: "Subject?".to_string(),
                answer: "biology".to_string(),
            }],
        };
        h.sessions.create(&session).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_message_binds_and_starts_onboarding() {
        let h = harness();
        let edu = persona("edu", &["Subject?"]);
        h.personas.create(&edu).await.unwrap();

        let outcome = h.pipeline.handle(&inbound("room-1", "u-1", "hello")).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Onboarding);

        let session = h.sessions.get("room-1").await.unwrap().unwrap();
        assert_eq!(session.persona_id, Some(edu.id));
        assert_eq!(session.state, OnboardingState::AskingGroupOrDm);
        // Binding + stage advance persisted as one versioned write.
        assert_eq!(session.version, 1);

        let sent = h.dispatcher.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.message, onboarding::GROUP_PROMPT);
    }

    // Group onboarding end to end, then a grounded completion.
    #[tokio::test]
    async fn test_group_room_onboards_then_replies() {
        let h = harness();
        let edu = persona("edu", &["Subject?"]);
        h.personas.create(&edu).await.unwrap();

        for text in ["hi", "yes", "always", "biology"] {
            let outcome = h.pipeline.handle(&inbound("room-1", "u-1", text)).await.unwrap();
            assert_eq!(outcome, PipelineOutcome::Onboarding);
        }
        let session = h.sessions.get("room-1").await.unwrap().unwrap();
        assert!(session.onboarding_done);

        let outcome = h
            .pipeline
            .handle(&inbound("room-1", "u-1", "what is mitosis"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Replied);

        // Onboarding exchanges stay out of the conversation log.
        let turns = h.turns.rows.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "what is mitosis");
        assert_eq!(turns[1].content, "a thoughtful answer");
        assert!(turns[1].response_ms.is_some());
    }

    #[tokio::test]
    async fn test_completion_request_carries_onboarding_and_knowledge() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;
        h.knowledge
            .add(
                &KnowledgeChunk {
                    id: Uuid::now_v7(),
                    document_id: "doc-1".to_string(),
                    persona_id: edu.id,
                    text: "mitosis splits a cell".to_string(),
                    metadata: None,
                },
                &[0.1; 4],
            )
            .await
            .unwrap();

        h.pipeline
            .handle(&inbound("room-1", "u-1", "what is mitosis"))
            .await
            .unwrap();

        let requests = h.completion.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let system = &requests[0].messages[0];
        assert!(system.content.contains("Subject?: biology"));
        assert!(system.content.contains("mitosis splits a cell"));
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].max_tokens, 512);
    }

    #[tokio::test]
    async fn test_reply_references_inbound_message_id() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;

        let message = inbound("room-1", "u-1", "what is mitosis");
        h.pipeline.handle(&message).await.unwrap();

        let sent = h.dispatcher.sent.lock().unwrap();
        assert_eq!(sent[0].0.reply_to, message.message_id);
        assert!(sent[0].0.success);
    }

    #[tokio::test]
    async fn test_reset_wipes_room_and_confirms() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;
        h.pipeline.handle(&inbound("room-1", "u-1", "hello there")).await.unwrap();

        let outcome = h
            .pipeline
            .handle(&inbound("room-1", "u-1", "please /reset"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Reset);
        assert!(h.sessions.get("room-1").await.unwrap().is_none());
        assert_eq!(h.turns.count().await.unwrap(), 0);

        let confirmation = {
            let sent = h.dispatcher.sent.lock().unwrap();
            sent.last().unwrap().0.message.clone()
        };
        assert_eq!(confirmation, resolver::RESET_CONFIRMATION);

        // The next message starts over with the verbatim opening prompt.
        let outcome = h.pipeline.handle(&inbound("room-1", "u-1", "hi again")).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Onboarding);
        let sent = h.dispatcher.sent.lock().unwrap();
        assert_eq!(sent.last().unwrap().0.message, onboarding::GROUP_PROMPT);
    }

    #[tokio::test]
    async fn test_foreign_mention_redirects_without_rebinding() {
        let h = harness();
        let edu = persona("edu", &[]);
        let lab = persona("lab", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;
        h.personas.create(&lab).await.unwrap();

        let outcome = h
            .pipeline
            .handle(&inbound("room-1", "u-1", "@lab help me"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Redirected);
        assert_eq!(
            h.sessions.get("room-1").await.unwrap().unwrap().persona_id,
            Some(edu.id)
        );
        let sent = h.dispatcher.sent.lock().unwrap();
        assert!(sent[0].0.message.contains("@edu"));
        // Redirected messages never reach the log or the LLM.
        assert!(h.completion.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_on_mention_room_stays_silent() {
        let h = harness();
        let edu = persona("edu", &[]);
        h.personas.create(&edu).await.unwrap();
        let mut session = RoomSession::new("room-1");
        session.persona_id = Some(edu.id);
        session.is_group = Some(true);
        session.mention_mode = MentionMode::OnMention;
        session.onboarding_done = true;
        session.state = OnboardingState::Completed { answers: vec![] };
        h.sessions.create(&session).await.unwrap();

        let outcome = h
            .pipeline
            .handle(&inbound("room-1", "u-1", "just chatting"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Ignored);
        assert!(h.dispatcher.sent.lock().unwrap().is_empty());
        assert_eq!(h.turns.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_completion_failure_sends_fallback_and_keeps_user_turn() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;
        h.completion.fail.store(true, Ordering::SeqCst);

        let outcome = h
            .pipeline
            .handle(&inbound("room-1", "u-1", "what is mitosis"))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::CompletionFailed);

        let sent = h.dispatcher.sent.lock().unwrap();
        assert_eq!(sent[0].0.message, FALLBACK_REPLY);
        // The user turn persisted; no assistant turn was fabricated.
        let turns = h.turns.rows.lock().unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "what is mitosis");

        let records = h.telemetry.records.lock().unwrap();
        let completion_record = records
            .iter()
            .find(|r| r.endpoint == UsageEndpoint::Completion)
            .unwrap();
        assert!(!completion_record.success);
    }

    #[tokio::test]
    async fn test_user_turn_persist_failure_fails_closed() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;
        h.turns.fail_append.store(true, Ordering::SeqCst);

        let result = h.pipeline.handle(&inbound("room-1", "u-1", "hello")).await;
        assert!(result.is_err());
        // No LLM call, no reply.
        assert!(h.completion.requests.lock().unwrap().is_empty());
        assert!(h.dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_version_conflict_replays_once() {
        let h = harness();
        let edu = persona("edu", &["Subject?"]);
        h.personas.create(&edu).await.unwrap();
        h.sessions.conflict_once.store(true, Ordering::SeqCst);

        let outcome = h.pipeline.handle(&inbound("room-1", "u-1", "hello")).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Onboarding);
        let session = h.sessions.get("room-1").await.unwrap().unwrap();
        assert_eq!(session.state, OnboardingState::AskingGroupOrDm);
    }

    #[tokio::test]
    async fn test_no_registered_personas_is_silent() {
        let h = harness();
        let outcome = h.pipeline.handle(&inbound("room-1", "u-1", "hello")).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::NoPersona);
        assert!(h.dispatcher.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_usage_recorded_for_embedding_and_completion() {
        let h = harness();
        let edu = persona("edu", &[]);
        seed_onboarded_room(&h, &edu, "room-1").await;

        h.pipeline.handle(&inbound("room-1", "u-1", "hi")).await.unwrap();

        let records = h.telemetry.records.lock().unwrap();
        assert!(records.iter().any(|r| r.endpoint == UsageEndpoint::Embedding));
        assert!(records.iter().any(|r| r.endpoint == UsageEndpoint::Completion));
        assert!(records.iter().all(|r| r.success));
    }
}
