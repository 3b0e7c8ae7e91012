//! Identity resolution backed by the character and player registries.

use std::sync::Arc;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::identity::IdentityResolver;
use storyloom_core::ids::{CharacterId, MemberId};

use crate::domain::repository::{CharacterRepository, PlayerRepository};

/// Resolves character → owning player → member.
#[derive(Clone)]
pub struct RegistryIdentityResolver {
    characters: Arc<dyn CharacterRepository>,
    players: Arc<dyn PlayerRepository>,
}

impl RegistryIdentityResolver {
    /// Creates a resolver over the given registries.
    #[must_use]
    pub fn new(characters: Arc<dyn CharacterRepository>, players: Arc<dyn PlayerRepository>) -> Self {
        Self {
            characters,
            players,
        }
    }
}

#[async_trait]
impl IdentityResolver for RegistryIdentityResolver {
    async fn member_for(&self, character_id: CharacterId) -> Result<MemberId, DomainError> {
        let failed = |reason: &str| DomainError::IdentityResolutionFailed {
            character_id,
            reason: reason.to_owned(),
        };

        let character = self
            .characters
            .find(character_id)
            .await?
            .ok_or_else(|| failed("character does not exist"))?;
        let owner = character
            .owner
            .ok_or_else(|| failed("character has no owning player"))?;
        let player = self
            .players
            .find(owner)
            .await?
            .ok_or_else(|| failed("owning player is no longer registered"))?;

        Ok(player.member)
    }
}

#[cfg(test)]
mod tests {
    use storyloom_core::color::Color;
    use storyloom_core::ids::{GuildId, PlayerId};

    use super::*;
    use crate::domain::aggregates::{Character, Player};
    use crate::testing::{InMemoryCharacterRepository, InMemoryPlayerRepository};

    #[tokio::test]
    async fn test_member_for_follows_owner_to_member() {
        // Arrange
        let player = Player::new(PlayerId::new(), GuildId::new("g"), MemberId::new("m-7"), "Ash");
        let character =
            Character::new(CharacterId::new(), "Mira", Color::WHITE, Some(player.id)).unwrap();
        let resolver = RegistryIdentityResolver::new(
            Arc::new(InMemoryCharacterRepository::with([character.clone()])),
            Arc::new(InMemoryPlayerRepository::with([player])),
        );

        // Act
        let member = resolver.member_for(character.id).await.unwrap();

        // Assert
        assert_eq!(member, MemberId::new("m-7"));
    }

    #[tokio::test]
    async fn test_member_for_fails_when_owner_left() {
        // Arrange
        let character =
            Character::new(CharacterId::new(), "Mira", Color::WHITE, Some(PlayerId::new())).unwrap();
        let resolver = RegistryIdentityResolver::new(
            Arc::new(InMemoryCharacterRepository::with([character.clone()])),
            Arc::new(InMemoryPlayerRepository::default()),
        );

        // Act
        let result = resolver.member_for(character.id).await;

        // Assert
        match result.unwrap_err() {
            DomainError::IdentityResolutionFailed { character_id, .. } => {
                assert_eq!(character_id, character.id);
            }
            other => panic!("expected IdentityResolutionFailed, got {other:?}"),
        }
    }
}
