//! Persistence ports for the Character context.

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, GuildId, InformationId, MemberId, PlayerId};

use super::aggregates::{Character, Player};
use super::information::Information;

/// Stores characters together with the tier assignment of their information.
#[async_trait]
pub trait CharacterRepository: Send + Sync {
    /// Inserts a new character.
    async fn create(&self, character: &Character) -> Result<(), DomainError>;

    /// Loads a character, including its information store.
    async fn find(&self, id: CharacterId) -> Result<Option<Character>, DomainError>;

    /// Overwrites a stored character.
    async fn update(&self, character: &Character) -> Result<(), DomainError>;
}

/// Stores player registrations.
#[async_trait]
pub trait PlayerRepository: Send + Sync {
    /// Inserts a new player.
    async fn create(&self, player: &Player) -> Result<(), DomainError>;

    /// Loads a player by id.
    async fn find(&self, id: PlayerId) -> Result<Option<Player>, DomainError>;

    /// Loads the player registered for `member` in `guild`.
    async fn find_by_member(
        &self,
        guild: &GuildId,
        member: &MemberId,
    ) -> Result<Option<Player>, DomainError>;

    /// Overwrites a stored player.
    async fn update(&self, player: &Player) -> Result<(), DomainError>;
}

/// Stores information records.
#[async_trait]
pub trait InformationRepository: Send + Sync {
    /// Inserts a new information record.
    async fn create(&self, information: &Information) -> Result<(), DomainError>;

    /// Loads an information record.
    async fn find(&self, id: InformationId) -> Result<Option<Information>, DomainError>;

    /// Deletes an information record. Returns whether a record existed.
    async fn destroy(&self, id: InformationId) -> Result<bool, DomainError>;
}
