//! Knowledge store trait definition.
//!
//! Nearest-neighbor search is delegated to an external similarity-search
//! primitive (LanceDB in chorus-infra); this trait is the seam the
//! retrieval engine talks to.

use chorus_types::error::RepositoryError;
use chorus_types::knowledge::{KnowledgeChunk, RankedChunk};
use uuid::Uuid;

/// Vector-indexed knowledge chunk storage with persona-scoped search.
///
/// Every operation takes a persona id; implementations must guarantee that
/// a search scoped to persona X can never return chunks owned by persona Y.
pub trait KnowledgeStore: Send + Sync {
    /// Cosine-similarity search over the persona's chunks.
    ///
    /// Returns at most `limit` chunks with similarity >= `min_similarity`,
    /// ranked nearest-first.
    fn search(
        &self,
        persona_id: &Uuid,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> impl std::future::Future<Output = Result<Vec<RankedChunk>, RepositoryError>> + Send;

    /// Add a chunk with its embedding (ingestion collaborator / tests).
    fn add(
        &self,
        chunk: &KnowledgeChunk,
        embedding: &[f32],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete all chunks for a persona. Returns the count removed.
    fn delete_persona(
        &self,
        persona_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count chunks for a persona.
    fn count(
        &self,
        persona_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
