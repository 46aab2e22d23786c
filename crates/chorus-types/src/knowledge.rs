//! Knowledge chunk types for retrieval-augmented generation.
//!
//! Chunks are produced by the external document-ingestion pipeline and are
//! read-only to the conversation core. Retrieval is always scoped to a
//! single persona; cross-persona leakage is forbidden by construction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One embedded slice of an ingested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: Uuid,
    /// The source document this chunk was cut from. Opaque to the core;
    /// the ingestion pipeline owns the format.
    pub document_id: String,
    /// The persona whose knowledge base owns this chunk.
    pub persona_id: Uuid,
    pub text: String,
    /// Free-form ingestion metadata (source path, page, chunk index).
    pub metadata: Option<String>,
}

/// A retrieved chunk with its similarity to the query embedding.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: KnowledgeChunk,
    /// Cosine similarity in [0, 1]; higher is closer.
    pub similarity: f32,
    /// Raw cosine distance as reported by the vector store.
    pub distance: f32,
}
