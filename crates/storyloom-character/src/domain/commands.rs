//! Commands for the Character context.

use storyloom_core::command::Command;
use storyloom_core::ids::{CharacterId, GuildId, InformationId, MemberId, PlayerId};
use uuid::Uuid;

use super::information::Classification;

/// Command to create a new character.
#[derive(Debug, Clone)]
pub struct CreateCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character's name.
    pub name: String,
    /// Optional `#RRGGBB` color; white when absent.
    pub color: Option<String>,
    /// The player who will control the character.
    pub owner: Option<PlayerId>,
}

impl Command for CreateCharacter {
    fn command_type(&self) -> &'static str {
        "character.create_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to edit a character's name and/or color.
#[derive(Debug, Clone)]
pub struct EditCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: CharacterId,
    /// New display name.
    pub name: Option<String>,
    /// New `#RRGGBB` color.
    pub color: Option<String>,
}

impl Command for EditCharacter {
    fn command_type(&self) -> &'static str {
        "character.edit_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to add information to a character.
#[derive(Debug, Clone)]
pub struct AddInformation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: CharacterId,
    /// Tier to file the information under.
    pub classification: Classification,
    /// Information name.
    pub name: String,
    /// `type` tag (attribute, skill, generic, ...).
    pub kind: String,
    /// Raw value.
    pub value: String,
}

impl Command for AddInformation {
    fn command_type(&self) -> &'static str {
        "character.add_information"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove information from a character.
#[derive(Debug, Clone)]
pub struct RemoveInformation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: CharacterId,
    /// The information to remove.
    pub information_id: InformationId,
}

impl Command for RemoveInformation {
    fn command_type(&self) -> &'static str {
        "character.remove_information"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move information to another tier.
#[derive(Debug, Clone)]
pub struct ReclassifyInformation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: CharacterId,
    /// The information to move.
    pub information_id: InformationId,
    /// The new tier.
    pub classification: Classification,
}

impl Command for ReclassifyInformation {
    fn command_type(&self) -> &'static str {
        "character.reclassify_information"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to make a character aware of a fact.
#[derive(Debug, Clone)]
pub struct LearnFact {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character identifier.
    pub character_id: CharacterId,
    /// Opaque fact reference.
    pub fact: String,
}

impl Command for LearnFact {
    fn command_type(&self) -> &'static str {
        "character.learn_fact"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to register a member as a player.
#[derive(Debug, Clone)]
pub struct RegisterPlayer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The community the player joins.
    pub guild: GuildId,
    /// The member registering.
    pub member: MemberId,
    /// The member's display handle.
    pub display_name: String,
}

impl Command for RegisterPlayer {
    fn command_type(&self) -> &'static str {
        "character.register_player"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to hand control of a character to a player.
#[derive(Debug, Clone)]
pub struct AssignCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The player receiving the character.
    pub player_id: PlayerId,
    /// The character being assigned.
    pub character_id: CharacterId,
}

impl Command for AssignCharacter {
    fn command_type(&self) -> &'static str {
        "character.assign_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
