//! Aggregate roots for the Character context.

use std::collections::BTreeSet;

use storyloom_core::color::Color;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, GuildId, MemberId, PlayerId};

use super::information::InformationStore;

/// A named actor in a roleplay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    /// Aggregate identifier.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
    /// Color used when publishing this character's posts.
    pub color: Color,
    /// Owning player; `None` for GM characters.
    pub owner: Option<PlayerId>,
    /// Classified information about the character.
    pub information: InformationStore,
    /// Opaque references to facts the character is aware of, oldest first.
    pub knowledge: Vec<String>,
}

impl Character {
    /// Creates a character with no information or knowledge.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank.
    pub fn new(
        id: CharacterId,
        name: impl Into<String>,
        color: Color,
        owner: Option<PlayerId>,
    ) -> Result<Self, DomainError> {
        let name = validate_name(name.into())?;
        Ok(Self {
            id,
            name,
            color,
            owner,
            information: InformationStore::default(),
            knowledge: Vec::new(),
        })
    }

    /// Applies an edit of the display name and/or color. Nothing changes if
    /// any part of the edit is invalid.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the new name is blank.
    pub fn edit(&mut self, name: Option<String>, color: Option<Color>) -> Result<(), DomainError> {
        let name = name.map(validate_name).transpose()?;
        if let Some(name) = name {
            self.name = name;
        }
        if let Some(color) = color {
            self.color = color;
        }
        Ok(())
    }

    /// Records that the character became aware of `fact`.
    pub fn learn(&mut self, fact: impl Into<String>) {
        self.knowledge.push(fact.into());
    }
}

fn validate_name(name: String) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(
            "character name must not be empty".to_owned(),
        ));
    }
    Ok(trimmed.to_owned())
}

/// A community member's registration as a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Aggregate identifier.
    pub id: PlayerId,
    /// Community the player registered in.
    pub guild: GuildId,
    /// The member behind this player.
    pub member: MemberId,
    /// Display handle captured at registration.
    pub display_name: String,
    /// Characters the player controls.
    pub characters: BTreeSet<CharacterId>,
}

impl Player {
    /// Creates a player that controls no characters yet.
    #[must_use]
    pub fn new(id: PlayerId, guild: GuildId, member: MemberId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            guild,
            member,
            display_name: display_name.into(),
            characters: BTreeSet::new(),
        }
    }

    /// Whether the player controls `character_id`.
    #[must_use]
    pub fn controls(&self, character_id: CharacterId) -> bool {
        self.characters.contains(&character_id)
    }
}
