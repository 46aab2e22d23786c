//! PersonaRepository trait definition.

use chorus_types::error::RepositoryError;
use chorus_types::persona::BotPersona;
use uuid::Uuid;

/// Repository trait for bot personas.
///
/// Personas are created by the admin subsystem; the conversation core only
/// reads them. `create` exists for that collaborator and for tests.
pub trait PersonaRepository: Send + Sync {
    /// All registered personas, ordered by creation time ascending.
    ///
    /// The ordering matters: an unbound room binds the *first* mentioned
    /// persona in creation order, falling back to the oldest.
    fn list_by_creation(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<BotPersona>, RepositoryError>> + Send;

    /// Fetch a persona by id.
    fn get(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<BotPersona>, RepositoryError>> + Send;

    /// Look up a persona by its exact mention name.
    fn find_by_mention(
        &self,
        mention_name: &str,
    ) -> impl std::future::Future<Output = Result<Option<BotPersona>, RepositoryError>> + Send;

    /// Insert a persona (admin collaborator / test seeding).
    fn create(
        &self,
        persona: &BotPersona,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
