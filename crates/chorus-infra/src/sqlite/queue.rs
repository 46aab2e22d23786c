//! SQLite completion job queue implementation.

use chorus_core::repository::queue::JobQueue;
use chorus_types::error::RepositoryError;
use chorus_types::job::{CompletionJob, JobStatus};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `JobQueue`.
///
/// The single-connection writer pool serializes claims, so two workers can
/// never dequeue the same job.
pub struct SqliteJobQueue {
    pool: DatabasePool,
}

impl SqliteJobQueue {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct JobRow {
    id: String,
    payload: String,
    status: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            payload: row.try_get("payload")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            last_error: row.try_get("last_error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_job(self) -> Result<CompletionJob, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid job id: {e}")))?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)
            .map_err(|e| RepositoryError::Query(format!("invalid job payload: {e}")))?;
        let status: JobStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(CompletionJob {
            id,
            payload,
            status,
            attempts: self.attempts as u32,
            last_error: self.last_error,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &CompletionJob) -> Result<Uuid, RepositoryError> {
        let payload = serde_json::to_string(&job.payload)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize payload: {e}")))?;

        sqlx::query(
            r#"INSERT INTO completion_jobs (id, payload, status, attempts, last_error, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(job.id.to_string())
        .bind(payload)
        .bind(job.status.to_string())
        .bind(job.attempts as i64)
        .bind(&job.last_error)
        .bind(format_datetime(&job.created_at))
        .bind(format_datetime(&job.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(job.id)
    }

    async fn dequeue(&self) -> Result<Option<CompletionJob>, RepositoryError> {
        let now = format_datetime(&chrono::Utc::now());
        // Claim and return in one statement on the serialized writer.
        let row = sqlx::query(
            r#"UPDATE completion_jobs
               SET status = 'running', attempts = attempts + 1, updated_at = ?
               WHERE id = (
                 SELECT id FROM completion_jobs WHERE status = 'pending'
                 ORDER BY created_at ASC, id ASC LIMIT 1
               )
               RETURNING *"#,
        )
        .bind(now)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let job_row =
                    JobRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(job_row.into_job()?))
            }
            None => Ok(None),
        }
    }
}
