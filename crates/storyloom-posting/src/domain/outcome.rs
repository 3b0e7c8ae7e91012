//! Results reported to collaborators.

use serde::Serialize;
use storyloom_core::ids::{CharacterId, MessageRef, PostId};
use storyloom_session::domain::turn_order::UndoMode;

/// How a posting request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "message_refs", rename_all = "snake_case")]
pub enum PostOutcome {
    /// Published and recorded; references are in chunk order.
    Done(Vec<MessageRef>),
    /// The user cancelled, or finished without writing anything.
    Cancelled,
    /// Selection or a content reply did not arrive in time.
    TimedOut,
    /// Another attempt is in flight for the session.
    Busy,
    /// The requester controls no eligible character.
    NoCharacters,
}

/// How an undo request ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum UndoOutcome {
    /// The latest post was reversed.
    Undone {
        /// The removed record.
        post_id: PostId,
        /// Its author.
        character_id: CharacterId,
        /// Messages actually deleted; already-gone ones are not counted.
        deleted_messages: usize,
        /// Restoration mode applied.
        mode: UndoMode,
    },
    /// The session has no posts.
    NothingToUndo,
    /// A posting attempt is in flight for the session.
    Busy,
}

impl UndoOutcome {
    /// Whether a post was reversed.
    #[must_use]
    pub fn is_undone(&self) -> bool {
        matches!(self, Self::Undone { .. })
    }
}
