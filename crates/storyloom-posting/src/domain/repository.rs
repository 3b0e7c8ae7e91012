//! Persistence port for post records.

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{PostId, SessionId};

use super::post::PostRecord;

/// Stores the append-only post log.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Appends a record.
    async fn create(&self, post: &PostRecord) -> Result<(), DomainError>;

    /// Loads the most recently created record for a session.
    async fn find_latest_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PostRecord>, DomainError>;

    /// Deletes a record. Returns whether it existed.
    async fn destroy(&self, id: PostId) -> Result<bool, DomainError>;
}
