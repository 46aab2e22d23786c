//! TurnRepository trait definition.

use chorus_types::error::RepositoryError;
use chorus_types::turn::ConversationTurn;
use uuid::Uuid;

/// Repository trait for the append-only conversation log.
///
/// There is no update operation; turns are immutable once written. The only
/// delete path is a full room reset (or the external retention sweep, which
/// bypasses this trait).
pub trait TurnRepository: Send + Sync {
    /// Append one turn and return its id.
    fn append(
        &self,
        turn: &ConversationTurn,
    ) -> impl std::future::Future<Output = Result<Uuid, RepositoryError>> + Send;

    /// The most recent `limit` turns for a room, returned oldest-first.
    fn recent_history(
        &self,
        room_token: &str,
        limit: u32,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationTurn>, RepositoryError>> + Send;

    /// Delete every turn for a room. Reset only.
    fn delete_room(
        &self,
        room_token: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Count all turns (diagnostics).
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
