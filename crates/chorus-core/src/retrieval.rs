//! RAG retrieval engine.
//!
//! Builds an embedding query from the room's onboarding answers, the tail
//! of the conversation, and the current message, then searches the
//! persona's knowledge store. Retrieval is strictly best-effort: any
//! embedding or search failure degrades to an empty result with a warning,
//! never a failed reply.

use std::time::Instant;

use chorus_types::knowledge::RankedChunk;
use chorus_types::llm::{UsageEndpoint, UsageRecord};
use chorus_types::persona::BotPersona;
use chorus_types::session::QaPair;
use chorus_types::turn::ConversationTurn;
use tracing::{info_span, warn, Instrument};

use crate::knowledge::KnowledgeStore;
use crate::llm::Embedder;
use crate::repository::telemetry::TelemetryRepository;

/// How many distinct prior turns fold into the retrieval query.
const QUERY_HISTORY_TURNS: usize = 2;

/// Compose the retrieval query text.
///
/// Layout: onboarding answers first (stable room context), then up to
/// [`QUERY_HISTORY_TURNS`] distinct recent turn contents, then the current
/// message. Later parts carry the freshest intent, so the current message
/// always comes last.
pub fn build_query(answers: &[QaPair], history: &[ConversationTurn], message: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for pair in answers {
        parts.push(pair.answer.as_str());
    }
    // Walk the tail backwards to find the latest distinct contents, then
    // restore chronological order.
    let mut recent: Vec<&str> = Vec::new();
    for turn in history.iter().rev() {
        let content = turn.content.as_str();
        if content == message || recent.contains(&content) {
            continue;
        }
        recent.push(content);
        if recent.len() == QUERY_HISTORY_TURNS {
            break;
        }
    }
    recent.reverse();
    parts.extend(recent);
    parts.push(message);
    parts.join("\n")
}

/// Retrieval engine wiring an embedder to a persona-scoped knowledge store.
///
/// Records one usage row per embedding call; telemetry failures are
/// swallowed like every other failure on this path.
pub struct RetrievalEngine<E, K, M> {
    embedder: E,
    store: K,
    telemetry: M,
    default_top_k: u32,
    min_similarity: f32,
}

impl<E: Embedder, K: KnowledgeStore, M: TelemetryRepository> RetrievalEngine<E, K, M> {
    pub fn new(embedder: E, store: K, telemetry: M, default_top_k: u32, min_similarity: f32) -> Self {
        Self {
            embedder,
            store,
            telemetry,
            default_top_k,
            min_similarity,
        }
    }

    /// Retrieve the persona's nearest chunks for this conversational moment.
    ///
    /// Never fails; embedding or search errors log a warning and return an
    /// empty set so the caller can proceed without grounding.
    pub async fn retrieve(
        &self,
        persona: &BotPersona,
        answers: &[QaPair],
        history: &[ConversationTurn],
        message: &str,
    ) -> Vec<RankedChunk> {
        let query = build_query(answers, history, message);
        let span = info_span!(
            "gen_ai.embeddings",
            gen_ai.request.model = %persona.embedding_model,
        );

        let started = Instant::now();
        let result = self
            .embedder
            .embed(&query, &persona.embedding_model)
            .instrument(span)
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let usage = UsageRecord::new(
            UsageEndpoint::Embedding,
            &persona.embedding_model,
            result.as_ref().map(|r| r.total_tokens).unwrap_or(0),
            latency_ms,
            result.is_ok(),
        );
        if let Err(error) = self.telemetry.record(&usage).await {
            warn!(%error, "failed to record embedding usage");
        }

        let embedding = match result {
            Ok(response) => response.embedding,
            Err(error) => {
                warn!(persona = %persona.mention_name, %error, "embedding failed, skipping retrieval");
                return Vec::new();
            }
        };
        let top_k = persona.rag_top_k.unwrap_or(self.default_top_k);
        match self
            .store
            .search(&persona.id, &embedding, top_k as usize, self.min_similarity)
            .await
        {
            Ok(chunks) => chunks,
            Err(error) => {
                warn!(persona = %persona.mention_name, %error, "knowledge search failed, skipping retrieval");
                Vec::new()
            }
        }
    }
}
