//! TelemetryRepository trait definition.

use chorus_types::error::RepositoryError;
use chorus_types::llm::UsageRecord;

/// Repository trait for LLM usage telemetry.
///
/// Callers treat writes as best-effort: the pipeline swallows errors from
/// this trait so a telemetry outage never blocks a reply.
pub trait TelemetryRepository: Send + Sync {
    /// Record one usage row.
    fn record(
        &self,
        record: &UsageRecord,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
