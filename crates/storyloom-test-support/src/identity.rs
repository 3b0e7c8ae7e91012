//! Identity resolver backed by a fixed table.

use std::collections::HashMap;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::identity::IdentityResolver;
use storyloom_core::ids::{CharacterId, MemberId};

/// Resolves characters from a prepared map. Unknown characters fail with
/// `DomainError::IdentityResolutionFailed`.
#[derive(Debug, Default, Clone)]
pub struct StaticIdentityResolver {
    members: HashMap<CharacterId, MemberId>,
}

impl StaticIdentityResolver {
    /// Creates a resolver from `(character, member)` pairs.
    #[must_use]
    pub fn with(pairs: impl IntoIterator<Item = (CharacterId, MemberId)>) -> Self {
        Self {
            members: pairs.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn member_for(&self, character_id: CharacterId) -> Result<MemberId, DomainError> {
        self.members
            .get(&character_id)
            .cloned()
            .ok_or_else(|| DomainError::IdentityResolutionFailed {
                character_id,
                reason: "no member registered for character".to_owned(),
            })
    }
}
