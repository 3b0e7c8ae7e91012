//! In-memory repositories for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, GuildId, InformationId, MemberId, PlayerId};

use crate::domain::aggregates::{Character, Player};
use crate::domain::information::Information;
use crate::domain::repository::{CharacterRepository, InformationRepository, PlayerRepository};

/// Keeps characters in a map.
#[derive(Debug, Default)]
pub struct InMemoryCharacterRepository {
    characters: Mutex<HashMap<CharacterId, Character>>,
}

impl InMemoryCharacterRepository {
    /// Creates a repository pre-populated with `characters`.
    #[must_use]
    pub fn with(characters: impl IntoIterator<Item = Character>) -> Self {
        Self {
            characters: Mutex::new(characters.into_iter().map(|c| (c.id, c)).collect()),
        }
    }

    /// Returns a stored character.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, id: CharacterId) -> Option<Character> {
        self.characters.lock().unwrap().get(&id).cloned()
    }

    /// Removes a character, simulating it having been purged elsewhere.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn forget(&self, id: CharacterId) {
        self.characters.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl CharacterRepository for InMemoryCharacterRepository {
    async fn create(&self, character: &Character) -> Result<(), DomainError> {
        self.characters
            .lock()
            .unwrap()
            .insert(character.id, character.clone());
        Ok(())
    }

    async fn find(&self, id: CharacterId) -> Result<Option<Character>, DomainError> {
        Ok(self.get(id))
    }

    async fn update(&self, character: &Character) -> Result<(), DomainError> {
        let mut characters = self.characters.lock().unwrap();
        match characters.get_mut(&character.id) {
            Some(stored) => {
                *stored = character.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("character", character.id)),
        }
    }
}

/// Keeps players in a map.
#[derive(Debug, Default)]
pub struct InMemoryPlayerRepository {
    players: Mutex<HashMap<PlayerId, Player>>,
}

impl InMemoryPlayerRepository {
    /// Creates a repository pre-populated with `players`.
    #[must_use]
    pub fn with(players: impl IntoIterator<Item = Player>) -> Self {
        Self {
            players: Mutex::new(players.into_iter().map(|p| (p.id, p)).collect()),
        }
    }

    /// Returns a stored player.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<Player> {
        self.players.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl PlayerRepository for InMemoryPlayerRepository {
    async fn create(&self, player: &Player) -> Result<(), DomainError> {
        self.players.lock().unwrap().insert(player.id, player.clone());
        Ok(())
    }

    async fn find(&self, id: PlayerId) -> Result<Option<Player>, DomainError> {
        Ok(self.get(id))
    }

    async fn find_by_member(
        &self,
        guild: &GuildId,
        member: &MemberId,
    ) -> Result<Option<Player>, DomainError> {
        Ok(self
            .players
            .lock()
            .unwrap()
            .values()
            .find(|p| &p.guild == guild && &p.member == member)
            .cloned())
    }

    async fn update(&self, player: &Player) -> Result<(), DomainError> {
        let mut players = self.players.lock().unwrap();
        match players.get_mut(&player.id) {
            Some(stored) => {
                *stored = player.clone();
                Ok(())
            }
            None => Err(DomainError::not_found("player", player.id)),
        }
    }
}

/// Keeps information records in a map.
#[derive(Debug, Default)]
pub struct InMemoryInformationRepository {
    records: Mutex<HashMap<InformationId, Information>>,
}

impl InMemoryInformationRepository {
    /// Number of stored records.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl InformationRepository for InMemoryInformationRepository {
    async fn create(&self, information: &Information) -> Result<(), DomainError> {
        self.records
            .lock()
            .unwrap()
            .insert(information.id, information.clone());
        Ok(())
    }

    async fn find(&self, id: InformationId) -> Result<Option<Information>, DomainError> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn destroy(&self, id: InformationId) -> Result<bool, DomainError> {
        Ok(self.records.lock().unwrap().remove(&id).is_some())
    }
}
