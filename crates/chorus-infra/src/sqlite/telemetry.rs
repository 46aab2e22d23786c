//! SQLite usage telemetry implementation.

use chorus_core::repository::telemetry::TelemetryRepository;
use chorus_types::error::RepositoryError;
use chorus_types::llm::{UsageEndpoint, UsageRecord};
use sqlx::Row;

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime};

/// SQLite-backed implementation of `TelemetryRepository`.
#[derive(Clone)]
pub struct SqliteTelemetryRepository {
    pool: DatabasePool,
}

impl SqliteTelemetryRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// All rows, newest first. Diagnostics only.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<UsageRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM usage_telemetry ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let endpoint: String = row
                .try_get("endpoint")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let endpoint: UsageEndpoint = endpoint
                .parse()
                .map_err(|e: String| RepositoryError::Query(e))?;
            let model: String = row
                .try_get("model")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let total_tokens: i64 = row
                .try_get("total_tokens")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let latency_ms: i64 = row
                .try_get("latency_ms")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let success: i64 = row
                .try_get("success")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let created_at: String = row
                .try_get("created_at")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

            records.push(UsageRecord {
                endpoint,
                model,
                total_tokens: total_tokens as u32,
                latency_ms: latency_ms as u64,
                success: success != 0,
                created_at: parse_datetime(&created_at)?,
            });
        }

        Ok(records)
    }
}

impl TelemetryRepository for SqliteTelemetryRepository {
    async fn record(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO usage_telemetry (endpoint, model, total_tokens, latency_ms, success, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(record.endpoint.to_string())
        .bind(&record.model)
        .bind(record.total_tokens as i64)
        .bind(record.latency_ms as i64)
        .bind(record.success as i64)
        .bind(format_datetime(&record.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
