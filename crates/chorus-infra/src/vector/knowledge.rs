//! LanceDB-backed knowledge store.
//!
//! Implements `KnowledgeStore` from `chorus-core` with one table per
//! persona. Nearest-neighbor ranking is delegated to LanceDB's cosine
//! vector search; this layer filters by similarity and maps Arrow batches
//! back to domain chunks.

use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field};
use futures_util::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use uuid::Uuid;

use chorus_core::knowledge::KnowledgeStore;
use chorus_types::error::RepositoryError;
use chorus_types::knowledge::{KnowledgeChunk, RankedChunk};

use super::lance::LanceVectorStore;
use super::schema::knowledge_chunks_schema;

/// LanceDB implementation of `KnowledgeStore`.
pub struct LanceKnowledgeStore {
    store: LanceVectorStore,
    dimension: i32,
}

impl LanceKnowledgeStore {
    /// Wrap a vector store; `dimension` must match the embedding endpoint.
    pub fn new(store: LanceVectorStore, dimension: u32) -> Self {
        Self {
            store,
            dimension: dimension as i32,
        }
    }

    async fn ensure_persona_table(
        &self,
        persona_id: &Uuid,
    ) -> Result<lancedb::Table, RepositoryError> {
        let table_name = LanceVectorStore::knowledge_table_name(persona_id);
        let schema = Arc::new(knowledge_chunks_schema(self.dimension));
        self.store
            .ensure_table(&table_name, schema)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to ensure knowledge table: {e}")))
    }

    /// Build an Arrow RecordBatch from a chunk and its embedding.
    fn build_record_batch(
        &self,
        chunk: &KnowledgeChunk,
        embedding: &[f32],
    ) -> Result<RecordBatch, RepositoryError> {
        if embedding.len() != self.dimension as usize {
            return Err(RepositoryError::Query(format!(
                "embedding has {} dimensions, table expects {}",
                embedding.len(),
                self.dimension
            )));
        }

        let schema = Arc::new(knowledge_chunks_schema(self.dimension));

        let id_array = StringArray::from(vec![chunk.id.to_string()]);
        let document_id_array = StringArray::from(vec![chunk.document_id.clone()]);
        let persona_id_array = StringArray::from(vec![chunk.persona_id.to_string()]);
        let text_array = StringArray::from(vec![chunk.text.clone()]);
        let metadata_array: StringArray = match &chunk.metadata {
            Some(m) => StringArray::from(vec![Some(m.clone())]),
            None => StringArray::from(vec![None::<String>]),
        };

        let values = Float32Array::from(embedding.to_vec());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::new(field, self.dimension, Arc::new(values), None);

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(document_id_array),
                Arc::new(persona_id_array),
                Arc::new(text_array),
                Arc::new(metadata_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| RepositoryError::Query(format!("failed to build record batch: {e}")))
    }

    /// Parse Arrow RecordBatch rows back into domain chunks.
    fn record_batch_to_chunks(batch: &RecordBatch) -> Result<Vec<KnowledgeChunk>, RepositoryError> {
        let num_rows = batch.num_rows();
        if num_rows == 0 {
            return Ok(vec![]);
        }

        let string_column = |name: &str| -> Result<&StringArray, RepositoryError> {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| RepositoryError::Query(format!("missing column '{name}'")))
        };

        let ids = string_column("id")?;
        let document_ids = string_column("document_id")?;
        let persona_ids = string_column("persona_id")?;
        let texts = string_column("text")?;
        let metadatas = string_column("metadata")?;

        let mut chunks = Vec::with_capacity(num_rows);
        for i in 0..num_rows {
            let id = Uuid::parse_str(ids.value(i))
                .map_err(|e| RepositoryError::Query(format!("invalid chunk id: {e}")))?;
            let persona_id = Uuid::parse_str(persona_ids.value(i))
                .map_err(|e| RepositoryError::Query(format!("invalid persona_id: {e}")))?;
            let metadata = if metadatas.is_null(i) {
                None
            } else {
                Some(metadatas.value(i).to_string())
            };

            chunks.push(KnowledgeChunk {
                id,
                document_id: document_ids.value(i).to_string(),
                persona_id,
                text: texts.value(i).to_string(),
                metadata,
            });
        }

        Ok(chunks)
    }
}

impl KnowledgeStore for LanceKnowledgeStore {
    async fn search(
        &self,
        persona_id: &Uuid,
        query_embedding: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> Result<Vec<RankedChunk>, RepositoryError> {
        let table = self.ensure_persona_table(persona_id).await?;

        let results = table
            .vector_search(query_embedding)
            .map_err(|e| RepositoryError::Query(format!("vector search setup failed: {e}")))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit * 2) // Fetch extra to account for min_similarity filtering
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("vector search failed: {e}")))?;

        let batches: Vec<RecordBatch> = results
            .try_collect()
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to collect results: {e}")))?;

        let mut ranked: Vec<RankedChunk> = Vec::new();

        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }

            // The _distance column is added by LanceDB vector search
            let distance_col = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

            let chunks = Self::record_batch_to_chunks(batch)?;
            for (i, chunk) in chunks.into_iter().enumerate() {
                let distance: f32 = distance_col.map_or(0.0, |d| d.value(i));
                let similarity = (1.0 - distance).max(0.0);
                if similarity < min_similarity {
                    continue;
                }
                ranked.push(RankedChunk {
                    chunk,
                    similarity,
                    distance,
                });
            }
        }

        ranked.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(limit);

        Ok(ranked)
    }

    async fn add(&self, chunk: &KnowledgeChunk, embedding: &[f32]) -> Result<(), RepositoryError> {
        let table = self.ensure_persona_table(&chunk.persona_id).await?;

        let batch = self.build_record_batch(chunk, embedding)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to add chunk: {e}")))?;

        Ok(())
    }

    async fn delete_persona(&self, persona_id: &Uuid) -> Result<u64, RepositoryError> {
        let table_name = LanceVectorStore::knowledge_table_name(persona_id);
        if !self.store.table_exists(&table_name).await {
            return Ok(0);
        }

        let removed = self.count(persona_id).await?;
        self.store
            .drop_table(&table_name)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to drop table: {e}")))?;

        Ok(removed)
    }

    async fn count(&self, persona_id: &Uuid) -> Result<u64, RepositoryError> {
        let table_name = LanceVectorStore::knowledge_table_name(persona_id);
        if !self.store.table_exists(&table_name).await {
            return Ok(0);
        }

        let table = self.ensure_persona_table(persona_id).await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| RepositoryError::Query(format!("failed to count rows: {e}")))?;

        Ok(rows as u64)
    }
}
