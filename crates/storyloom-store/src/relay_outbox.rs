//! Outbox of messages emitted through the relay messaging surface.
//!
//! The relay does not talk to a chat platform directly. Everything it would
//! send is written here, addressed either to a channel or privately to a
//! member, and a bridge process picks the rows up.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, MemberId, MessageRef};
use storyloom_posting::domain::messaging::Author;
use tracing::instrument;

use crate::error::StoreError;

/// Where an outbox entry is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OutboxTarget {
    /// A channel message.
    Channel(ChannelId),
    /// A private message.
    Member(MemberId),
}

/// One message in the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboxEntry {
    /// Reference handed back to the posting pipeline.
    pub reference: MessageRef,
    /// Addressee.
    pub target: OutboxTarget,
    /// Current text.
    pub body: String,
    /// Character voice, if any.
    pub author: Option<Author>,
    /// Footer line.
    pub footer: Option<String>,
    /// Whether the message has been retracted.
    pub deleted: bool,
    /// When the message was first written.
    pub created_at: DateTime<Utc>,
}

/// Storage for the relay's outgoing messages.
#[async_trait]
pub trait RelayOutbox: Send + Sync {
    /// Records a new message.
    async fn append(&self, entry: &OutboxEntry) -> Result<(), DomainError>;

    /// Replaces the text of a live message. Returns `false` if the message is
    /// unknown or deleted.
    async fn edit(&self, reference: &MessageRef, body: &str) -> Result<bool, DomainError>;

    /// Marks a message deleted. Returns `false` if it was already deleted or
    /// never existed.
    async fn mark_deleted(&self, reference: &MessageRef) -> Result<bool, DomainError>;

    /// Loads a message, deleted or not.
    async fn find(&self, reference: &MessageRef) -> Result<Option<OutboxEntry>, DomainError>;

    /// Lists the live messages of a channel in the order they were written.
    async fn list_channel(&self, channel: &ChannelId) -> Result<Vec<OutboxEntry>, DomainError>;
}

/// PostgreSQL-backed relay outbox.
#[derive(Debug, Clone)]
pub struct PgRelayOutbox {
    pool: PgPool,
}

impl PgRelayOutbox {
    /// Creates a new `PgRelayOutbox`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_ENTRIES: &str = r"
SELECT reference, channel_id, member_id, body, author_name, author_color,
       footer, deleted, created_at
FROM relay_messages";

fn entry_from_row(row: &PgRow) -> Result<OutboxEntry, StoreError> {
    let channel: Option<String> = row.try_get("channel_id")?;
    let member: Option<String> = row.try_get("member_id")?;
    let target = match (channel, member) {
        (Some(channel), None) => OutboxTarget::Channel(ChannelId::new(channel)),
        (None, Some(member)) => OutboxTarget::Member(MemberId::new(member)),
        _ => {
            return Err(StoreError::corrupt(
                "channel_id",
                "exactly one of channel_id and member_id must be set",
            ));
        }
    };

    let author_name: Option<String> = row.try_get("author_name")?;
    let author_color: Option<String> = row.try_get("author_color")?;
    let author = match (author_name, author_color) {
        (Some(name), Some(color)) => Some(Author {
            name,
            color: color
                .parse()
                .map_err(|e| StoreError::corrupt("author_color", e))?,
        }),
        _ => None,
    };

    Ok(OutboxEntry {
        reference: MessageRef::new(row.try_get::<String, _>("reference")?),
        target,
        body: row.try_get("body")?,
        author,
        footer: row.try_get("footer")?,
        deleted: row.try_get("deleted")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl RelayOutbox for PgRelayOutbox {
    #[instrument(skip_all, fields(reference = %entry.reference))]
    async fn append(&self, entry: &OutboxEntry) -> Result<(), DomainError> {
        let (channel, member) = match &entry.target {
            OutboxTarget::Channel(channel) => (Some(channel.as_str()), None),
            OutboxTarget::Member(member) => (None, Some(member.as_str())),
        };
        sqlx::query(
            r"
            INSERT INTO relay_messages (
                reference, channel_id, member_id, body, author_name, author_color,
                footer, deleted, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ",
        )
        .bind(entry.reference.as_str())
        .bind(channel)
        .bind(member)
        .bind(&entry.body)
        .bind(entry.author.as_ref().map(|a| a.name.as_str()))
        .bind(entry.author.as_ref().map(|a| a.color.to_string()))
        .bind(entry.footer.as_deref())
        .bind(entry.deleted)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn edit(&self, reference: &MessageRef, body: &str) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE relay_messages SET body = $2, updated_at = NOW()
            WHERE reference = $1 AND NOT deleted
            ",
        )
        .bind(reference.as_str())
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_deleted(&self, reference: &MessageRef) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE relay_messages SET deleted = TRUE, updated_at = NOW()
            WHERE reference = $1 AND NOT deleted
            ",
        )
        .bind(reference.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find(&self, reference: &MessageRef) -> Result<Option<OutboxEntry>, DomainError> {
        let row = sqlx::query(&format!("{SELECT_ENTRIES} WHERE reference = $1"))
            .bind(reference.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.as_ref()
            .map(entry_from_row)
            .transpose()
            .map_err(Into::into)
    }

    async fn list_channel(&self, channel: &ChannelId) -> Result<Vec<OutboxEntry>, DomainError> {
        let rows = sqlx::query(&format!(
            "{SELECT_ENTRIES} WHERE channel_id = $1 AND NOT deleted ORDER BY created_at, reference"
        ))
        .bind(channel.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;
        rows.iter()
            .map(entry_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }
}
