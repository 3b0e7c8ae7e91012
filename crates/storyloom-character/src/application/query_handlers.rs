//! Query handlers for the Character context.
//!
//! Read-only views over characters and players.

use serde::Serialize;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, InformationId, MemberId, PlayerId};

use crate::domain::information::{Classification, InformationValue, Viewer};
use crate::domain::repository::{CharacterRepository, PlayerRepository};

/// One information entry as seen by a viewer.
#[derive(Debug, Serialize)]
pub struct InformationView {
    /// Identifier.
    pub id: InformationId,
    /// Tier the entry is filed under.
    pub classification: Classification,
    /// Name.
    pub name: String,
    /// `type` tag.
    pub kind: String,
    /// Value.
    pub value: InformationValue,
}

/// Read-only view of a character filtered by the viewer's clearance.
#[derive(Debug, Serialize)]
pub struct CharacterView {
    /// Identifier.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
    /// `#RRGGBB` color.
    pub color: String,
    /// Owning player, if any.
    pub owner: Option<PlayerId>,
    /// Known fact references.
    pub knowledge: Vec<String>,
    /// Information the viewer may see.
    pub information: Vec<InformationView>,
}

/// Read-only view of a player.
#[derive(Debug, Serialize)]
pub struct PlayerView {
    /// Identifier.
    pub id: PlayerId,
    /// The member behind the player.
    pub member: MemberId,
    /// Display handle.
    pub display_name: String,
    /// Characters the player controls.
    pub characters: Vec<CharacterId>,
}

/// Retrieves a character, exposing only the information `viewer` may see.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the character does not exist, or a
/// persistence error.
pub async fn get_character_view(
    character_id: CharacterId,
    viewer: Viewer,
    repo: &dyn CharacterRepository,
) -> Result<CharacterView, DomainError> {
    let character = repo
        .find(character_id)
        .await?
        .ok_or_else(|| DomainError::not_found("character", character_id))?;

    let information = character
        .information
        .visible_to(viewer)
        .into_iter()
        .map(|(classification, entry)| InformationView {
            id: entry.id,
            classification,
            name: entry.name.clone(),
            kind: entry.kind.as_str().to_owned(),
            value: entry.value.clone(),
        })
        .collect();

    Ok(CharacterView {
        id: character.id,
        name: character.name,
        color: character.color.to_string(),
        owner: character.owner,
        knowledge: character.knowledge,
        information,
    })
}

/// Retrieves a player by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the player does not exist, or a
/// persistence error.
pub async fn get_player_view(
    player_id: PlayerId,
    repo: &dyn PlayerRepository,
) -> Result<PlayerView, DomainError> {
    let player = repo
        .find(player_id)
        .await?
        .ok_or_else(|| DomainError::not_found("player", player_id))?;

    Ok(PlayerView {
        id: player.id,
        member: player.member,
        display_name: player.display_name,
        characters: player.characters.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use storyloom_core::color::Color;
    use storyloom_core::ids::InformationId;

    use super::*;
    use crate::domain::aggregates::Character;
    use crate::domain::information::{Information, InformationKind};
    use crate::testing::InMemoryCharacterRepository;

    #[tokio::test]
    async fn test_get_character_view_hides_gm_information_from_owner() {
        // Arrange
        let mut character = Character::new(CharacterId::new(), "Mira", Color::WHITE, None).unwrap();
        let motto = Information::from_parts(
            InformationId::new(),
            "Motto",
            InformationKind::Generic,
            "Onward",
        )
        .unwrap();
        let secret = Information::from_parts(
            InformationId::new(),
            "True name",
            InformationKind::Generic,
            "Ilse",
        )
        .unwrap();
        character.information.add(Classification::Public, motto);
        character.information.add(Classification::Gm, secret);
        let repo = InMemoryCharacterRepository::with([character.clone()]);

        // Act
        let owner_view = get_character_view(character.id, Viewer::Owner, &repo)
            .await
            .unwrap();
        let gm_view = get_character_view(character.id, Viewer::Gm, &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(owner_view.information.len(), 1);
        assert_eq!(owner_view.information[0].name, "Motto");
        assert_eq!(gm_view.information.len(), 2);
    }

    #[tokio::test]
    async fn test_get_character_view_returns_not_found() {
        let repo = InMemoryCharacterRepository::default();

        let result = get_character_view(CharacterId::new(), Viewer::Anyone, &repo).await;

        assert!(matches!(result, Err(DomainError::NotFound { entity: "character", .. })));
    }
}
