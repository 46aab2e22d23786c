//! SQLite room session repository implementation.
//!
//! Implements `SessionRepository` from `chorus-core` using sqlx with split
//! read/write pools: raw queries, a private Row struct for mapping, and a
//! compare-and-swap update keyed on the `version` column.

use chorus_core::repository::session::SessionRepository;
use chorus_types::error::RepositoryError;
use chorus_types::persona::MentionMode;
use chorus_types::session::{OnboardingState, RoomSession};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `SessionRepository`.
pub struct SqliteSessionRepository {
    pool: DatabasePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

/// Internal row type for mapping SQLite rows to domain RoomSession.
struct RoomSessionRow {
    room_token: String,
    persona_id: Option<String>,
    is_group: Option<i64>,
    dm_user_id: Option<String>,
    mention_mode: String,
    onboarding_done: i64,
    state: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl RoomSessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            room_token: row.try_get("room_token")?,
            persona_id: row.try_get("persona_id")?,
            is_group: row.try_get("is_group")?,
            dm_user_id: row.try_get("dm_user_id")?,
            mention_mode: row.try_get("mention_mode")?,
            onboarding_done: row.try_get("onboarding_done")?,
            state: row.try_get("state")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<RoomSession, RepositoryError> {
        let persona_id = self
            .persona_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid persona_id: {e}")))?;
        let mention_mode: MentionMode = self
            .mention_mode
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        // An unexpected state shape fails loudly instead of being coerced.
        let state: OnboardingState = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid onboarding state: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(RoomSession {
            room_token: self.room_token,
            persona_id,
            is_group: self.is_group.map(|v| v != 0),
            dm_user_id: self.dm_user_id,
            mention_mode,
            onboarding_done: self.onboarding_done != 0,
            state,
            version: self.version,
            created_at,
            updated_at,
        })
    }
}

fn serialize_state(state: &OnboardingState) -> Result<String, RepositoryError> {
    serde_json::to_string(state)
        .map_err(|e| RepositoryError::Query(format!("failed to serialize state: {e}")))
}

impl SessionRepository for SqliteSessionRepository {
    async fn get(&self, room_token: &str) -> Result<Option<RoomSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM room_sessions WHERE room_token = ?")
            .bind(room_token)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = RoomSessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn create(&self, session: &RoomSession) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"INSERT INTO room_sessions (room_token, persona_id, is_group, dm_user_id, mention_mode, onboarding_done, state, version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&session.room_token)
        .bind(session.persona_id.map(|id| id.to_string()))
        .bind(session.is_group.map(i64::from))
        .bind(&session.dm_user_id)
        .bind(session.mention_mode.to_string())
        .bind(session.onboarding_done as i64)
        .bind(serialize_state(&session.state)?)
        .bind(session.version)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(
                RepositoryError::Conflict(format!("session exists for room {}", session.room_token)),
            ),
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn update_versioned(&self, session: &RoomSession) -> Result<RoomSession, RepositoryError> {
        let now = chrono::Utc::now();
        let result = sqlx::query(
            r#"UPDATE room_sessions
               SET persona_id = ?, is_group = ?, dm_user_id = ?, mention_mode = ?,
                   onboarding_done = ?, state = ?, version = version + 1, updated_at = ?
               WHERE room_token = ? AND version = ?"#,
        )
        .bind(session.persona_id.map(|id| id.to_string()))
        .bind(session.is_group.map(i64::from))
        .bind(&session.dm_user_id)
        .bind(session.mention_mode.to_string())
        .bind(session.onboarding_done as i64)
        .bind(serialize_state(&session.state)?)
        .bind(format_datetime(&now))
        .bind(&session.room_token)
        .bind(session.version)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Zero rows means another webhook advanced the session first.
        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "stale version {} for room {}",
                session.version, session.room_token
            )));
        }

        let mut updated = session.clone();
        updated.version += 1;
        updated.updated_at = now;
        Ok(updated)
    }

    async fn delete(&self, room_token: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM room_sessions WHERE room_token = ?")
            .bind(room_token)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }

    async fn latest_completed_dm_for_user(
        &self,
        user_id: &str,
        exclude_room: &str,
    ) -> Result<Option<RoomSession>, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT * FROM room_sessions
               WHERE dm_user_id = ? AND onboarding_done = 1 AND is_group = 0 AND room_token != ?
               ORDER BY updated_at DESC LIMIT 1"#,
        )
        .bind(user_id)
        .bind(exclude_room)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = RoomSessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM room_sessions")
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(count as u64)
    }
}
