//! SessionRepository trait definition.

use chorus_types::error::RepositoryError;
use chorus_types::session::RoomSession;

/// Repository trait for per-room session state.
///
/// Updates are versioned: `update_versioned` compares the session's stored
/// version, and a mismatch yields `RepositoryError::Conflict` so the caller
/// can reload and retry. This is what makes binding and onboarding stage
/// advancement safe under concurrent webhooks for the same room.
pub trait SessionRepository: Send + Sync {
    /// Fetch the session for a room, if one exists.
    fn get(
        &self,
        room_token: &str,
    ) -> impl std::future::Future<Output = Result<Option<RoomSession>, RepositoryError>> + Send;

    /// Insert a fresh session; the room must not already have one.
    fn create(
        &self,
        session: &RoomSession,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Compare-and-swap update keyed on `session.version`.
    ///
    /// On success the stored version becomes `session.version + 1` and the
    /// updated session is returned. A stale version yields `Conflict`.
    fn update_versioned(
        &self,
        session: &RoomSession,
    ) -> impl std::future::Future<Output = Result<RoomSession, RepositoryError>> + Send;

    /// Delete the session row entirely. Used only by the explicit reset.
    fn delete(
        &self,
        room_token: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The most recent *completed* DM session belonging to `user_id`,
    /// excluding `exclude_room`. Feeds the onboarding reuse offer.
    fn latest_completed_dm_for_user(
        &self,
        user_id: &str,
        exclude_room: &str,
    ) -> impl std::future::Future<Output = Result<Option<RoomSession>, RepositoryError>> + Send;

    /// Count all sessions (diagnostics).
    fn count(&self) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
