//! The post record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyloom_core::ids::{CharacterId, MessageRef, PostId, SessionId};

/// A persisted log entry of one published turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Record identifier.
    pub id: PostId,
    /// The session posted to.
    pub session_id: SessionId,
    /// The acting character.
    pub character_id: CharacterId,
    /// Act at the time of posting.
    pub act: u32,
    /// Chapter at the time of posting.
    pub chapter: u32,
    /// Round at the time of posting.
    pub round: u32,
    /// Raw content before chunking.
    pub content: String,
    /// Published messages, in chunk order.
    pub message_refs: Vec<MessageRef>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}
