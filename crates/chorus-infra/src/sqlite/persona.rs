//! SQLite persona repository implementation.

use chorus_core::repository::persona::PersonaRepository;
use chorus_types::error::RepositoryError;
use chorus_types::persona::BotPersona;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `PersonaRepository`.
pub struct SqlitePersonaRepository {
    pool: DatabasePool,
}

impl SqlitePersonaRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain BotPersona.
struct PersonaRow {
    id: String,
    mention_name: String,
    system_prompt: String,
    completion_model: String,
    embedding_model: String,
    rag_top_k: Option<i64>,
    group_questions: String,
    dm_questions: String,
    created_at: String,
}

impl PersonaRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            mention_name: row.try_get("mention_name")?,
            system_prompt: row.try_get("system_prompt")?,
            completion_model: row.try_get("completion_model")?,
            embedding_model: row.try_get("embedding_model")?,
            rag_top_k: row.try_get("rag_top_k")?,
            group_questions: row.try_get("group_questions")?,
            dm_questions: row.try_get("dm_questions")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_persona(self) -> Result<BotPersona, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid persona id: {e}")))?;
        let group_questions: Vec<String> = serde_json::from_str(&self.group_questions)
            .map_err(|e| RepositoryError::Query(format!("invalid group_questions: {e}")))?;
        let dm_questions: Vec<String> = serde_json::from_str(&self.dm_questions)
            .map_err(|e| RepositoryError::Query(format!("invalid dm_questions: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(BotPersona {
            id,
            mention_name: self.mention_name,
            system_prompt: self.system_prompt,
            completion_model: self.completion_model,
            embedding_model: self.embedding_model,
            rag_top_k: self.rag_top_k.map(|k| k as u32),
            group_questions,
            dm_questions,
            created_at,
        })
    }
}

impl PersonaRepository for SqlitePersonaRepository {
    async fn list_by_creation(&self) -> Result<Vec<BotPersona>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM personas ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut personas = Vec::with_capacity(rows.len());
        for row in &rows {
            let persona_row =
                PersonaRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            personas.push(persona_row.into_persona()?);
        }

        Ok(personas)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<BotPersona>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM personas WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let persona_row = PersonaRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(persona_row.into_persona()?))
            }
            None => Ok(None),
        }
    }

    async fn find_by_mention(
        &self,
        mention_name: &str,
    ) -> Result<Option<BotPersona>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM personas WHERE mention_name = ?")
            .bind(mention_name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let persona_row = PersonaRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(persona_row.into_persona()?))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, persona: &BotPersona) -> Result<(), RepositoryError> {
        let group_questions = serde_json::to_string(&persona.group_questions)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize questions: {e}")))?;
        let dm_questions = serde_json::to_string(&persona.dm_questions)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize questions: {e}")))?;

        let result = sqlx::query(
            r#"INSERT INTO personas (id, mention_name, system_prompt, completion_model, embedding_model, rag_top_k, group_questions, dm_questions, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(persona.id.to_string())
        .bind(&persona.mention_name)
        .bind(&persona.system_prompt)
        .bind(&persona.completion_model)
        .bind(&persona.embedding_model)
        .bind(persona.rag_top_k.map(|k| k as i64))
        .bind(group_questions)
        .bind(dm_questions)
        .bind(format_datetime(&persona.created_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("persona '{}' exists", persona.mention_name)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }
}
