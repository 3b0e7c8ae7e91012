//! Messaging surface port.
//!
//! The chat platform sits behind [`MessagingSurface`]. Waits on user input are
//! unbounded here; the pipeline applies its own deadlines.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use storyloom_core::color::Color;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, CharacterId, MemberId, MessageRef};

/// Display identity a message is published under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// Accent color.
    pub color: Color,
}

/// A message to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Message text.
    pub body: String,
    /// Character the message speaks as, if any.
    pub author: Option<Author>,
    /// Footer line.
    pub footer: Option<String>,
}

impl OutgoingMessage {
    /// A plain system message.
    #[must_use]
    pub fn plain(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            author: None,
            footer: None,
        }
    }
}

/// A message recovered from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedMessage {
    /// Reference to the message.
    pub reference: MessageRef,
    /// The text as published.
    pub body: String,
}

/// A file attached to a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Where the file can be downloaded.
    pub url: String,
    /// File name as uploaded.
    pub file_name: String,
    /// MIME type reported by the platform.
    pub content_type: Option<String>,
}

impl Attachment {
    /// Whether the attachment is a plain-text file.
    #[must_use]
    pub fn is_plain_text(&self) -> bool {
        match &self.content_type {
            Some(content_type) => content_type.starts_with("text/plain"),
            None => self.file_name.to_ascii_lowercase().ends_with(".txt"),
        }
    }
}

/// One reply from a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    /// Message text.
    #[serde(default)]
    pub content: String,
    /// Attached file, if any.
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl Reply {
    /// A text-only reply.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attachment: None,
        }
    }
}

/// A character offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterChoice {
    /// Character identifier.
    pub id: CharacterId,
    /// Display name.
    pub name: String,
}

/// Display details of a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    /// The member.
    pub member: MemberId,
    /// Display handle.
    pub display_name: String,
    /// Avatar image.
    pub avatar_url: Option<String>,
}

/// The chat platform as seen by the posting pipeline.
#[async_trait]
pub trait MessagingSurface: Send + Sync {
    /// Publishes a message to `channel`.
    async fn send_message(
        &self,
        channel: &ChannelId,
        message: OutgoingMessage,
    ) -> Result<MessageRef, DomainError>;

    /// Replaces the text of a published message.
    async fn edit_message(&self, message: &MessageRef, body: String) -> Result<(), DomainError>;

    /// Deletes a message. Returns `false` if it was already gone.
    async fn delete_message(&self, message: &MessageRef) -> Result<bool, DomainError>;

    /// Fetches a published message, or `None` if it no longer exists.
    async fn fetch_message(
        &self,
        message: &MessageRef,
    ) -> Result<Option<PublishedMessage>, DomainError>;

    /// Waits for the next reply from `member` in `channel`. `None` means the
    /// surface stopped listening.
    async fn await_reply(
        &self,
        channel: &ChannelId,
        member: &MemberId,
    ) -> Result<Option<Reply>, DomainError>;

    /// Asks `member` to pick one of `options`. `None` means no choice was made.
    async fn choose_character(
        &self,
        channel: &ChannelId,
        member: &MemberId,
        options: &[CharacterChoice],
    ) -> Result<Option<CharacterId>, DomainError>;

    /// Downloads the text of an attachment.
    async fn fetch_attachment_text(&self, attachment: &Attachment) -> Result<String, DomainError>;

    /// Sends a private message to `member`.
    async fn send_private(&self, member: &MemberId, body: String) -> Result<(), DomainError>;

    /// Resolves a member's display details.
    async fn resolve_member(&self, member: &MemberId) -> Result<MemberProfile, DomainError>;
}
