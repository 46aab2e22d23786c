//! JobQueue trait definition.

use chorus_types::error::RepositoryError;
use chorus_types::job::CompletionJob;
use uuid::Uuid;

/// Enqueue/dequeue contract for the background completion queue.
///
/// Retry and backoff policy live in the external worker; the core never
/// looks at a job again after enqueueing it.
pub trait JobQueue: Send + Sync {
    /// Insert a pending job and return its id.
    fn enqueue(
        &self,
        job: &CompletionJob,
    ) -> impl std::future::Future<Output = Result<Uuid, RepositoryError>> + Send;

    /// Claim the oldest pending job: mark it running, bump `attempts`, and
    /// return it. `None` when the queue is empty.
    fn dequeue(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<CompletionJob>, RepositoryError>> + Send;
}
