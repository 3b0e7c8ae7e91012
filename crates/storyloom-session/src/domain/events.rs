//! Domain events for the Session & Turn Order context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyloom_core::event::{DomainEvent, EventMetadata};
use storyloom_core::ids::{CharacterId, SessionId};

use super::turn_order::{TurnGroup, UndoMode};

/// Event type constant for `SessionCreated`.
pub const SESSION_CREATED_EVENT_TYPE: &str = "session.session_created";
/// Event type constant for `CharacterJoined`.
pub const CHARACTER_JOINED_EVENT_TYPE: &str = "session.character_joined";
/// Event type constant for `CharacterLeft`.
pub const CHARACTER_LEFT_EVENT_TYPE: &str = "session.character_left";
/// Event type constant for `TurnOrderSet`.
pub const TURN_ORDER_SET_EVENT_TYPE: &str = "session.turn_order_set";
/// Event type constant for `CharacterPosted`.
pub const CHARACTER_POSTED_EVENT_TYPE: &str = "session.character_posted";
/// Event type constant for `RoundStarted`.
pub const ROUND_STARTED_EVENT_TYPE: &str = "session.round_started";
/// Event type constant for `SectionBreak`.
pub const SECTION_BREAK_EVENT_TYPE: &str = "session.section_break";
/// Event type constant for `PostUndone`.
pub const POST_UNDONE_EVENT_TYPE: &str = "session.post_undone";
/// Event type constant for `TurnDurationSet`.
pub const TURN_DURATION_SET_EVENT_TYPE: &str = "session.turn_duration_set";
/// Event type constant for `TurnDeadlineSet`.
pub const TURN_DEADLINE_SET_EVENT_TYPE: &str = "session.turn_deadline_set";

/// Emitted when a session is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
    /// The session identifier.
    pub session_id: SessionId,
    /// The GM character created with the session.
    pub gm_character: CharacterId,
    /// Session name.
    pub name: String,
}

/// Emitted when a character joins a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterJoined {
    /// The session identifier.
    pub session_id: SessionId,
    /// The joining character.
    pub character_id: CharacterId,
}

/// Emitted when a character leaves a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterLeft {
    /// The session identifier.
    pub session_id: SessionId,
    /// The departing character.
    pub character_id: CharacterId,
}

/// Emitted when the round template is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOrderSet {
    /// The session identifier.
    pub session_id: SessionId,
    /// The new template.
    pub turn_order: Vec<TurnGroup>,
}

/// Emitted when a post has been recorded against the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterPosted {
    /// The session identifier.
    pub session_id: SessionId,
    /// The author.
    pub character_id: CharacterId,
    /// Whether the author was in the head group and got removed from it.
    pub removed_from_turn: bool,
}

/// Emitted when a new round starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStarted {
    /// The session identifier.
    pub session_id: SessionId,
    /// The new round number.
    pub round: u32,
}

/// Which counter a section break advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    /// A new act.
    Act,
    /// A new chapter.
    Chapter,
}

/// Emitted when an act or chapter begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionBreak {
    /// The session identifier.
    pub session_id: SessionId,
    /// Which counter advanced.
    pub kind: SectionKind,
    /// Act counter after the break.
    pub act: u32,
    /// Chapter counter after the break.
    pub chapter: u32,
    /// Optional title for the heading.
    pub title: Option<String>,
}

impl SectionBreak {
    /// Renders the heading announced to the channel.
    #[must_use]
    pub fn heading(&self) -> String {
        let label = match self.kind {
            SectionKind::Act => format!("Act {}", self.act),
            SectionKind::Chapter => format!("Chapter {}", self.chapter),
        };
        match &self.title {
            Some(title) => format!("{label}: {title}"),
            None => label,
        }
    }
}

/// Emitted when a post was undone and the turn order restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUndone {
    /// The session identifier.
    pub session_id: SessionId,
    /// The author of the undone post.
    pub character_id: CharacterId,
    /// Restoration mode applied.
    pub mode: UndoMode,
}

/// Emitted when the turn length changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDurationSet {
    /// The session identifier.
    pub session_id: SessionId,
    /// New turn length in milliseconds, or `None` for no deadline.
    pub turn_duration_ms: Option<i64>,
}

/// Emitted when the turn deadline is recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnDeadlineSet {
    /// The session identifier.
    pub session_id: SessionId,
    /// New deadline.
    pub turn_time: Option<DateTime<Utc>>,
}

/// Event payload variants for the Session & Turn Order context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventKind {
    /// A session has been created.
    SessionCreated(SessionCreated),
    /// A character joined.
    CharacterJoined(CharacterJoined),
    /// A character left.
    CharacterLeft(CharacterLeft),
    /// The round template was replaced.
    TurnOrderSet(TurnOrderSet),
    /// A post has been recorded.
    CharacterPosted(CharacterPosted),
    /// A new round started.
    RoundStarted(RoundStarted),
    /// An act or chapter began.
    SectionBreak(SectionBreak),
    /// A post was undone.
    PostUndone(PostUndone),
    /// The turn length changed.
    TurnDurationSet(TurnDurationSet),
    /// The turn deadline changed.
    TurnDeadlineSet(TurnDeadlineSet),
}

impl SessionEventKind {
    /// The event type string for this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionCreated(_) => SESSION_CREATED_EVENT_TYPE,
            Self::CharacterJoined(_) => CHARACTER_JOINED_EVENT_TYPE,
            Self::CharacterLeft(_) => CHARACTER_LEFT_EVENT_TYPE,
            Self::TurnOrderSet(_) => TURN_ORDER_SET_EVENT_TYPE,
            Self::CharacterPosted(_) => CHARACTER_POSTED_EVENT_TYPE,
            Self::RoundStarted(_) => ROUND_STARTED_EVENT_TYPE,
            Self::SectionBreak(_) => SECTION_BREAK_EVENT_TYPE,
            Self::PostUndone(_) => POST_UNDONE_EVENT_TYPE,
            Self::TurnDurationSet(_) => TURN_DURATION_SET_EVENT_TYPE,
            Self::TurnDeadlineSet(_) => TURN_DEADLINE_SET_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Session & Turn Order context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: SessionEventKind,
}

impl DomainEvent for SessionEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
