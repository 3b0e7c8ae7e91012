//! Reversing the most recent post.

use storyloom_core::error::DomainError;
use storyloom_session::application::command_handlers::commit;
use storyloom_session::application::registry::SessionHandle;
use storyloom_session::domain::turn_order::UndoMode;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::pipeline::PostingContext;
use crate::domain::chunking::{MAX_CHUNK_LEN, chunk_content};
use crate::domain::outcome::UndoOutcome;
use crate::domain::post::PostRecord;

/// A request to undo the latest post of a session.
#[derive(Debug, Clone, Copy)]
pub struct UndoRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// How the author is put back into the current round.
    pub mode: UndoMode,
}

/// Recovers the published text of `record`. The recorded content is used
/// instead when any of its messages can no longer be read, so a partial
/// read never loses a chunk.
async fn recover_content(ctx: &PostingContext<'_>, record: &PostRecord) -> String {
    let mut recovered = String::new();
    for reference in &record.message_refs {
        match ctx.messaging.fetch_message(reference).await {
            Ok(Some(message)) => recovered.push_str(&message.body),
            Ok(None) => {
                debug!(message = %reference, "published message already gone; using recorded content");
                return record.content.clone();
            }
            Err(e) => {
                warn!(message = %reference, error = %e, "failed to fetch published message; using recorded content");
                return record.content.clone();
            }
        }
    }
    recovered
}

/// Undoes the most recent post of the session behind `handle`.
///
/// The author's member is resolved before anything is changed. The published
/// messages are then read back, delivered privately to the author and deleted
/// (already-deleted messages are skipped), the record is destroyed, and the
/// turn order is restored according to `request.mode`.
///
/// # Errors
///
/// Returns `DomainError::IdentityResolutionFailed` if the author cannot be
/// resolved (nothing is changed), or a messaging/persistence error.
#[instrument(skip_all, fields(correlation_id = %request.correlation_id, mode = %request.mode))]
pub async fn handle_undo_request(
    ctx: &PostingContext<'_>,
    handle: &SessionHandle,
    request: &UndoRequest,
) -> Result<UndoOutcome, DomainError> {
    let Some(_guard) = handle.try_begin_posting() else {
        info!("posting in progress; undo refused");
        return Ok(UndoOutcome::Busy);
    };

    let (session_id, gm_character, gm_member) =
        handle.read(|s| (s.id, s.gm_character(), s.gm_member.clone()));
    let Some(record) = ctx.posts.find_latest_for_session(session_id).await? else {
        info!(session_id = %session_id, "nothing to undo");
        return Ok(UndoOutcome::NothingToUndo);
    };

    let author = if record.character_id == gm_character {
        gm_member
    } else {
        ctx.resolver.member_for(record.character_id).await?
    };

    let content = recover_content(ctx, &record).await;
    for chunk in chunk_content(&format!("Your post was undone:\n\n{content}"), MAX_CHUNK_LEN) {
        ctx.messaging.send_private(&author, chunk).await?;
    }

    let mut deleted_messages = 0;
    for reference in &record.message_refs {
        match ctx.messaging.delete_message(reference).await {
            Ok(true) => deleted_messages += 1,
            Ok(false) => debug!(message = %reference, "message was already deleted"),
            Err(e) => warn!(message = %reference, error = %e, "failed to delete message"),
        }
    }

    ctx.posts.destroy(record.id).await?;
    commit(handle, ctx.sessions, ctx.notifier, |session| {
        session.restore_after_undo(record.character_id, request.mode, request.correlation_id, ctx.clock);
        Ok(())
    })
    .await?;

    info!(post_id = %record.id, character_id = %record.character_id, deleted_messages, "post undone");
    Ok(UndoOutcome::Undone {
        post_id: record.id,
        character_id: record.character_id,
        deleted_messages,
        mode: request.mode,
    })
}
