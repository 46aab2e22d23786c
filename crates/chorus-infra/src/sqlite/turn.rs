//! SQLite conversation log implementation.

use chorus_core::repository::turn::TurnRepository;
use chorus_types::error::RepositoryError;
use chorus_types::turn::{ConversationTurn, TurnRole};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `TurnRepository`.
pub struct SqliteTurnRepository {
    pool: DatabasePool,
}

impl SqliteTurnRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain ConversationTurn.
struct TurnRow {
    id: String,
    room_token: String,
    user_id: String,
    role: String,
    content: String,
    model: Option<String>,
    response_ms: Option<i64>,
    created_at: String,
}

impl TurnRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            room_token: row.try_get("room_token")?,
            user_id: row.try_get("user_id")?,
            role: row.try_get("role")?,
            content: row.try_get("content")?,
            model: row.try_get("model")?,
            response_ms: row.try_get("response_ms")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_turn(self) -> Result<ConversationTurn, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid turn id: {e}")))?;
        let role: TurnRole = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(ConversationTurn {
            id,
            room_token: self.room_token,
            user_id: self.user_id,
            role,
            content: self.content,
            model: self.model,
            response_ms: self.response_ms.map(|v| v as u64),
            created_at,
        })
    }
}

impl TurnRepository for SqliteTurnRepository {
    async fn append(&self, turn: &ConversationTurn) -> Result<Uuid, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversation_turns (id, room_token, user_id, role, content, model, response_ms, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(turn.id.to_string())
        .bind(&turn.room_token)
        .bind(&turn.user_id)
        .bind(turn.role.to_string())
        .bind(&turn.content)
        .bind(&turn.model)
        .bind(turn.response_ms.map(|v| v as i64))
        .bind(format_datetime(&turn.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(turn.id)
    }

    async fn recent_history(
        &self,
        room_token: &str,
        limit: u32,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        // UUIDv7 ids are time-sortable, so id disambiguates turns created
        // within the same millisecond.
        let rows = sqlx::query(
            r#"SELECT * FROM (
                 SELECT * FROM conversation_turns WHERE room_token = ?
                 ORDER BY created_at DESC, id DESC LIMIT ?
               ) ORDER BY created_at ASC, id ASC"#,
        )
        .bind(room_token)
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in &rows {
            let turn_row =
                TurnRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            turns.push(turn_row.into_turn()?);
        }

        Ok(turns)
    }

    async fn delete_room(&self, room_token: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM conversation_turns WHERE room_token = ?")
            .bind(room_token)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM conversation_turns")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}
