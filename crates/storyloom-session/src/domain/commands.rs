//! Commands for the Session & Turn Order context.

use storyloom_core::command::Command;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, SessionId};
use uuid::Uuid;

/// Command to create a session and its GM character.
#[derive(Debug, Clone)]
pub struct CreateSession {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Session name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning community.
    pub guild: GuildId,
    /// The member acting as GM.
    pub gm_member: MemberId,
    /// Display name of the GM character.
    pub gm_name: String,
    /// Optional `#RRGGBB` color; white when absent.
    pub color: Option<String>,
    /// Channel posts are published to.
    pub channel: ChannelId,
}

impl Command for CreateSession {
    fn command_type(&self) -> &'static str {
        "session.create_session"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to replace a session's round template.
#[derive(Debug, Clone)]
pub struct SetTurnOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// Ordered turn groups.
    pub turn_order: Vec<Vec<CharacterId>>,
}

impl Command for SetTurnOrder {
    fn command_type(&self) -> &'static str {
        "session.set_turn_order"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to start a new act.
#[derive(Debug, Clone)]
pub struct IncrementAct {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// Optional heading title.
    pub title: Option<String>,
}

impl Command for IncrementAct {
    fn command_type(&self) -> &'static str {
        "session.increment_act"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to start a new chapter.
#[derive(Debug, Clone)]
pub struct IncrementChapter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// Optional heading title.
    pub title: Option<String>,
}

impl Command for IncrementChapter {
    fn command_type(&self) -> &'static str {
        "session.increment_chapter"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to change the turn length.
#[derive(Debug, Clone)]
pub struct SetTurnDuration {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// Turn length in milliseconds; `None` removes the deadline.
    pub turn_duration_ms: Option<i64>,
}

impl Command for SetTurnDuration {
    fn command_type(&self) -> &'static str {
        "session.set_turn_duration"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to add a character to a session.
#[derive(Debug, Clone)]
pub struct AddSessionCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// The joining character.
    pub character_id: CharacterId,
}

impl Command for AddSessionCharacter {
    fn command_type(&self) -> &'static str {
        "session.add_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to remove a character from a session.
#[derive(Debug, Clone)]
pub struct RemoveSessionCharacter {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The session identifier.
    pub session_id: SessionId,
    /// The departing character.
    pub character_id: CharacterId,
}

impl Command for RemoveSessionCharacter {
    fn command_type(&self) -> &'static str {
        "session.remove_character"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
