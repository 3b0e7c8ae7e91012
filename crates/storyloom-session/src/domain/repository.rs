//! Persistence port for the Session & Turn Order context.

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::SessionId;

use super::aggregates::SessionSnapshot;

/// Stores session snapshots.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Inserts a new session.
    async fn create(&self, session: &SessionSnapshot) -> Result<(), DomainError>;

    /// Loads a session.
    async fn find(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DomainError>;

    /// Loads every stored session.
    async fn find_all(&self) -> Result<Vec<SessionSnapshot>, DomainError>;

    /// Writes `session` if the stored version is older. A snapshot that is
    /// not newer than what is stored is skipped, so writes landing out of
    /// order never regress the row.
    async fn update(&self, session: &SessionSnapshot) -> Result<(), DomainError>;
}
