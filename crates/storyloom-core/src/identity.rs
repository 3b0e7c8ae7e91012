//! Identity resolution port.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::ids::{CharacterId, MemberId};

/// Resolves a character to the community member who controls it.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns the member owning `character_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IdentityResolutionFailed` when the character has
    /// no owner or the owner can no longer be resolved.
    async fn member_for(&self, character_id: CharacterId) -> Result<MemberId, DomainError>;
}
