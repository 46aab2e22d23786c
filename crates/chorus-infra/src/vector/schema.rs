//! Arrow schema definitions for LanceDB knowledge tables.
//!
//! Arrow versions MUST match lancedb's transitive dependency (57.3 for lancedb 0.26).

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};

/// Schema for per-persona knowledge chunk tables.
///
/// Each persona has its own table named `knowledge_{persona_id}`; the hard
/// table boundary is what guarantees cross-persona isolation. The vector
/// dimension comes from the embedding endpoint configuration.
pub fn knowledge_chunks_schema(dimension: i32) -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("document_id", DataType::Utf8, false),
        Field::new("persona_id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("metadata", DataType::Utf8, true),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                dimension,
            ),
            false,
        ),
    ])
}
