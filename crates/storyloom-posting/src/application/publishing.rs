//! Publishing chunks and section headings.

use storyloom_character::domain::aggregates::Character;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, MessageRef};
use storyloom_session::application::registry::SessionHandle;
use storyloom_session::domain::events::SectionBreak;
use storyloom_session::domain::turn_order::Progression;
use tracing::{info, instrument, warn};

use crate::domain::messaging::{Author, MessagingSurface, OutgoingMessage};

/// Footer stamped on a published chunk.
#[must_use]
pub fn chunk_footer(progression: Progression, index: usize, total: usize) -> String {
    if total > 1 {
        format!("{progression} | {} / {total}", index + 1)
    } else {
        progression.to_string()
    }
}

/// Publishes `chunks` in order as `character`. On failure the messages
/// already published are deleted before the error is returned.
///
/// # Errors
///
/// Returns the messaging error that stopped publishing.
#[instrument(skip_all, fields(character_id = %character.id, chunks = chunks.len()))]
pub async fn publish_chunks(
    messaging: &dyn MessagingSurface,
    channel: &ChannelId,
    character: &Character,
    progression: Progression,
    chunks: &[String],
) -> Result<Vec<MessageRef>, DomainError> {
    let mut published = Vec::with_capacity(chunks.len());
    for (index, chunk) in chunks.iter().enumerate() {
        let message = OutgoingMessage {
            body: chunk.clone(),
            author: Some(Author {
                name: character.name.clone(),
                color: character.color,
            }),
            footer: Some(chunk_footer(progression, index, chunks.len())),
        };
        match messaging.send_message(channel, message).await {
            Ok(reference) => published.push(reference),
            Err(e) => {
                warn!(error = %e, published = published.len(), "publishing failed; retracting");
                for reference in &published {
                    if let Err(delete_error) = messaging.delete_message(reference).await {
                        warn!(message = %reference, error = %delete_error, "failed to retract message");
                    }
                }
                return Err(e);
            }
        }
    }
    Ok(published)
}

/// Publishes a section heading to the session's channel.
///
/// # Errors
///
/// Returns the messaging error if the heading could not be sent.
#[instrument(skip_all, fields(session_id = %section.session_id))]
pub async fn announce_section_break(
    messaging: &dyn MessagingSurface,
    handle: &SessionHandle,
    section: &SectionBreak,
) -> Result<MessageRef, DomainError> {
    let (channel, color) = handle.read(|session| (session.channel.clone(), session.color));
    let heading = section.heading();
    let reference = messaging
        .send_message(
            &channel,
            OutgoingMessage {
                body: heading.clone(),
                author: Some(Author {
                    name: heading.clone(),
                    color,
                }),
                footer: None,
            },
        )
        .await?;
    info!(heading = %heading, "section break announced");
    Ok(reference)
}
