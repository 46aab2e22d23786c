//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

use chorus_types::error::RepositoryError;
use chrono::{DateTime, Utc};

pub mod persona;
pub mod pool;
pub mod queue;
pub mod session;
pub mod telemetry;
pub mod turn;

/// Timestamps are stored as RFC 3339 strings.
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
