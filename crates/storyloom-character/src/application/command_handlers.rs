//! Command handlers for the Character context.
//!
//! Each handler loads the affected aggregates, applies the command, and
//! persists the result.

use storyloom_core::color::Color;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, InformationId, PlayerId};
use tracing::{info, instrument};

use crate::domain::aggregates::{Character, Player};
use crate::domain::commands::{
    AddInformation, AssignCharacter, CreateCharacter, EditCharacter, LearnFact,
    ReclassifyInformation, RegisterPlayer, RemoveInformation,
};
use crate::domain::information::{Information, InformationKind};
use crate::domain::repository::{CharacterRepository, InformationRepository, PlayerRepository};

async fn load_character(
    repo: &dyn CharacterRepository,
    id: CharacterId,
) -> Result<Character, DomainError> {
    repo.find(id)
        .await?
        .ok_or_else(|| DomainError::not_found("character", id))
}

async fn load_player(repo: &dyn PlayerRepository, id: PlayerId) -> Result<Player, DomainError> {
    repo.find(id)
        .await?
        .ok_or_else(|| DomainError::not_found("player", id))
}

/// Handles the `CreateCharacter` command. When an owner is named, the player
/// record is updated to control the new character.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank name or malformed color,
/// `DomainError::NotFound` for an unknown owner, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_create_character(
    command: &CreateCharacter,
    characters: &dyn CharacterRepository,
    players: &dyn PlayerRepository,
) -> Result<Character, DomainError> {
    let color = command
        .color
        .as_deref()
        .map(str::parse::<Color>)
        .transpose()?
        .unwrap_or_default();
    let mut owner = match command.owner {
        Some(player_id) => Some(load_player(players, player_id).await?),
        None => None,
    };

    let character = Character::new(
        CharacterId::new(),
        command.name.clone(),
        color,
        command.owner,
    )?;
    characters.create(&character).await?;

    if let Some(player) = owner.as_mut() {
        player.characters.insert(character.id);
        players.update(player).await?;
    }

    info!(character_id = %character.id, name = %character.name, "character created");
    Ok(character)
}

/// Handles the `EditCharacter` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid edits (the character is left
/// unchanged), `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, character_id = %command.character_id))]
pub async fn handle_edit_character(
    command: &EditCharacter,
    characters: &dyn CharacterRepository,
) -> Result<Character, DomainError> {
    let mut character = load_character(characters, command.character_id).await?;
    let color = command
        .color
        .as_deref()
        .map(str::parse::<Color>)
        .transpose()?;

    character.edit(command.name.clone(), color)?;
    characters.update(&character).await?;

    info!("character edited");
    Ok(character)
}

/// Handles the `AddInformation` command: creates the information record and
/// files it under the requested tier.
///
/// # Errors
///
/// Returns `DomainError::Validation` for malformed information,
/// `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, character_id = %command.character_id))]
pub async fn handle_add_information(
    command: &AddInformation,
    characters: &dyn CharacterRepository,
    information: &dyn InformationRepository,
) -> Result<Information, DomainError> {
    let mut character = load_character(characters, command.character_id).await?;
    let entry = Information::from_parts(
        InformationId::new(),
        command.name.clone(),
        InformationKind::from(command.kind.clone()),
        &command.value,
    )?;

    information.create(&entry).await?;
    character
        .information
        .add(command.classification, entry.clone());
    characters.update(&character).await?;

    info!(information_id = %entry.id, classification = %command.classification, "information added");
    Ok(entry)
}

/// Handles the `RemoveInformation` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the character or the information entry
/// does not exist, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, character_id = %command.character_id))]
pub async fn handle_remove_information(
    command: &RemoveInformation,
    characters: &dyn CharacterRepository,
    information: &dyn InformationRepository,
) -> Result<Information, DomainError> {
    let mut character = load_character(characters, command.character_id).await?;
    let removed = character
        .information
        .remove(command.information_id)
        .ok_or_else(|| DomainError::not_found("information", command.information_id))?;

    characters.update(&character).await?;
    information.destroy(command.information_id).await?;

    info!(information_id = %command.information_id, "information removed");
    Ok(removed)
}

/// Handles the `ReclassifyInformation` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the character does not hold the
/// information entry, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, character_id = %command.character_id))]
pub async fn handle_reclassify_information(
    command: &ReclassifyInformation,
    characters: &dyn CharacterRepository,
) -> Result<Character, DomainError> {
    let mut character = load_character(characters, command.character_id).await?;
    if !character
        .information
        .set_classification(command.information_id, command.classification)
    {
        return Err(DomainError::not_found("information", command.information_id));
    }
    characters.update(&character).await?;

    info!(information_id = %command.information_id, classification = %command.classification, "information reclassified");
    Ok(character)
}

/// Handles the `LearnFact` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, character_id = %command.character_id))]
pub async fn handle_learn_fact(
    command: &LearnFact,
    characters: &dyn CharacterRepository,
) -> Result<Character, DomainError> {
    let mut character = load_character(characters, command.character_id).await?;
    character.learn(command.fact.clone());
    characters.update(&character).await?;
    Ok(character)
}

/// Handles the `RegisterPlayer` command. Registering the same member twice in
/// one guild returns the existing player.
///
/// # Errors
///
/// Returns a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, member = %command.member))]
pub async fn handle_register_player(
    command: &RegisterPlayer,
    players: &dyn PlayerRepository,
) -> Result<Player, DomainError> {
    if let Some(existing) = players
        .find_by_member(&command.guild, &command.member)
        .await?
    {
        return Ok(existing);
    }

    let player = Player::new(
        PlayerId::new(),
        command.guild.clone(),
        command.member.clone(),
        command.display_name.clone(),
    );
    players.create(&player).await?;

    info!(player_id = %player.id, "player registered");
    Ok(player)
}

/// Handles the `AssignCharacter` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if another player already controls the
/// character, `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, player_id = %command.player_id, character_id = %command.character_id))]
pub async fn handle_assign_character(
    command: &AssignCharacter,
    characters: &dyn CharacterRepository,
    players: &dyn PlayerRepository,
) -> Result<Player, DomainError> {
    let mut player = load_player(players, command.player_id).await?;
    let mut character = load_character(characters, command.character_id).await?;

    match character.owner {
        Some(owner) if owner != player.id => {
            return Err(DomainError::Validation(format!(
                "character {} is already controlled by player {owner}",
                character.id
            )));
        }
        Some(_) => {}
        None => {
            character.owner = Some(player.id);
            characters.update(&character).await?;
        }
    }

    if player.characters.insert(character.id) {
        players.update(&player).await?;
    }

    info!("character assigned");
    Ok(player)
}
