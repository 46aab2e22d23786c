//! LanceDB vector store wrapper for connection management and table operations.
//!
//! Provides `LanceVectorStore` which wraps a `lancedb::Connection` and offers
//! helper methods for table lifecycle (create, open, drop) using Arrow schemas.
//! The `KnowledgeStore` implementation lives in `vector::knowledge`.

use std::path::PathBuf;
use std::sync::Arc;

use arrow_schema::Schema;
use uuid::Uuid;

/// LanceDB vector store wrapper for connection and table management.
///
/// Manages a single LanceDB connection at a filesystem path. Each persona
/// gets its own knowledge table (`knowledge_{persona_id}`).
pub struct LanceVectorStore {
    db: lancedb::Connection,
    base_path: PathBuf,
}

impl LanceVectorStore {
    /// Open or create a LanceDB vector store at the given path.
    ///
    /// Creates the directory if it does not exist.
    pub async fn new(base_path: PathBuf) -> Result<Self, lancedb::Error> {
        std::fs::create_dir_all(&base_path).map_err(|e| lancedb::Error::CreateDir {
            path: base_path.display().to_string(),
            source: e,
        })?;

        let uri = base_path
            .to_str()
            .ok_or_else(|| lancedb::Error::InvalidInput {
                message: format!("Path contains invalid UTF-8: {}", base_path.display()),
            })?;

        let db = lancedb::connect(uri).execute().await?;

        Ok(Self { db, base_path })
    }

    /// Open or create a LanceDB vector store at the default path.
    ///
    /// Default: `~/.chorus/vector_store`
    pub async fn default() -> Result<Self, lancedb::Error> {
        let base_path = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chorus")
            .join("vector_store");

        Self::new(base_path).await
    }

    /// Table name for a persona's knowledge chunks.
    pub fn knowledge_table_name(persona_id: &Uuid) -> String {
        format!("knowledge_{}", persona_id.simple())
    }

    /// Ensure a table exists with the given schema.
    ///
    /// If the table already exists, opens it. If not, creates an empty table
    /// with the provided schema.
    pub async fn ensure_table(
        &self,
        table_name: &str,
        schema: Arc<Schema>,
    ) -> Result<lancedb::Table, lancedb::Error> {
        match self.db.open_table(table_name).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                tracing::info!(table = %table_name, "creating vector table");
                self.db
                    .create_empty_table(table_name, schema)
                    .execute()
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// Check if a table exists in the database.
    pub async fn table_exists(&self, table_name: &str) -> bool {
        self.db.open_table(table_name).execute().await.is_ok()
    }

    /// Drop a table from the database.
    ///
    /// Returns Ok(()) even if the table does not exist (idempotent).
    pub async fn drop_table(&self, table_name: &str) -> Result<(), lancedb::Error> {
        match self.db.drop_table(table_name, &[]).await {
            Ok(()) => Ok(()),
            Err(lancedb::Error::TableNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List all table names in the database.
    pub async fn table_names(&self) -> Result<Vec<String>, lancedb::Error> {
        self.db.table_names().execute().await
    }

    /// Get a reference to the underlying LanceDB connection.
    pub fn connection(&self) -> &lancedb::Connection {
        &self.db
    }

    /// Get the base path of the vector store.
    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::schema::knowledge_chunks_schema;

    #[test]
    fn test_knowledge_table_name_is_per_persona() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_ne!(
            LanceVectorStore::knowledge_table_name(&a),
            LanceVectorStore::knowledge_table_name(&b)
        );
        assert!(LanceVectorStore::knowledge_table_name(&a).starts_with("knowledge_"));
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LanceVectorStore::new(dir.path().to_path_buf()).await.unwrap();
        let schema = Arc::new(knowledge_chunks_schema(4));

        store.ensure_table("knowledge_test", schema.clone()).await.unwrap();
        store.ensure_table("knowledge_test", schema).await.unwrap();

        assert!(store.table_exists("knowledge_test").await);
        assert_eq!(store.table_names().await.unwrap(), vec!["knowledge_test"]);
    }

    #[tokio::test]
    async fn test_drop_table_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = LanceVectorStore::new(dir.path().to_path_buf()).await.unwrap();
        let schema = Arc::new(knowledge_chunks_schema(4));

        store.ensure_table("knowledge_gone", schema).await.unwrap();
        store.drop_table("knowledge_gone").await.unwrap();
        store.drop_table("knowledge_gone").await.unwrap();
        assert!(!store.table_exists("knowledge_gone").await);
    }
}
