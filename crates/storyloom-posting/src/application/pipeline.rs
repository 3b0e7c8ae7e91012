//! The posting pipeline.
//!
//! One call to [`handle_post_request`] runs a whole attempt: it claims the
//! session's posting slot, selects the acting character, collects content
//! under a per-reply deadline, publishes the chunks, records the post and
//! finally moves the turn order. Timeouts and cancellations leave the session
//! untouched, and the slot is released on every path.

use std::time::Duration;

use storyloom_character::domain::aggregates::Character;
use storyloom_character::domain::repository::{CharacterRepository, PlayerRepository};
use storyloom_core::clock::Clock;
use storyloom_core::error::DomainError;
use storyloom_core::identity::IdentityResolver;
use storyloom_core::ids::{ChannelId, CharacterId, MemberId, MessageRef, PlayerId, PostId};
use storyloom_session::application::command_handlers::commit;
use storyloom_session::application::notifier::SessionNotifier;
use storyloom_session::application::registry::SessionHandle;
use storyloom_session::domain::repository::SessionRepository;
use tokio::time::timeout;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::publishing::publish_chunks;
use crate::domain::attempt::{PostingAttempt, ReplyStep};
use crate::domain::chunking::MAX_CHUNK_LEN;
use crate::domain::messaging::{CharacterChoice, MessagingSurface, OutgoingMessage};
use crate::domain::outcome::PostOutcome;
use crate::domain::post::PostRecord;
use crate::domain::repository::PostRepository;

/// Default wait for a character selection.
pub const DEFAULT_SELECTION_WAIT: Duration = Duration::from_secs(60);
/// Default wait for each content reply.
pub const DEFAULT_CONTENT_WAIT: Duration = Duration::from_secs(600);

/// Deadlines applied while waiting on the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostingWaits {
    /// Wait for a character selection.
    pub selection: Duration,
    /// Wait for each content reply.
    pub content: Duration,
}

impl Default for PostingWaits {
    fn default() -> Self {
        Self {
            selection: DEFAULT_SELECTION_WAIT,
            content: DEFAULT_CONTENT_WAIT,
        }
    }
}

/// Collaborators shared by posting and undo.
#[derive(Clone, Copy)]
pub struct PostingContext<'a> {
    /// Time source for records and deadlines.
    pub clock: &'a dyn Clock,
    /// Session persistence.
    pub sessions: &'a dyn SessionRepository,
    /// Panel-refresh fan-out.
    pub notifier: &'a SessionNotifier,
    /// Character registry.
    pub characters: &'a dyn CharacterRepository,
    /// Player registry.
    pub players: &'a dyn PlayerRepository,
    /// Post log.
    pub posts: &'a dyn PostRepository,
    /// Chat platform.
    pub messaging: &'a dyn MessagingSurface,
    /// Character to member resolution.
    pub resolver: &'a dyn IdentityResolver,
    /// User-facing deadlines.
    pub waits: PostingWaits,
}

/// Who is asking to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    /// A registered player, acting through one of their characters.
    Player(PlayerId),
    /// The GM, acting as the session's GM character.
    Gm,
}

/// A request to run one posting attempt.
#[derive(Debug, Clone)]
pub struct PostRequest {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Who is posting.
    pub requester: Requester,
    /// Channel to prompt in; the session channel when absent.
    pub prompt_channel: Option<ChannelId>,
}

struct Eligibility {
    member: MemberId,
    characters: Vec<Character>,
}

async fn eligible_characters(
    ctx: &PostingContext<'_>,
    handle: &SessionHandle,
    requester: Requester,
) -> Result<Eligibility, DomainError> {
    let (members, gm_character, gm_member) = handle.read(|session| {
        (
            session.characters().clone(),
            session.gm_character(),
            session.gm_member.clone(),
        )
    });

    let (member, ids): (MemberId, Vec<CharacterId>) = match requester {
        Requester::Gm => (gm_member, vec![gm_character]),
        Requester::Player(player_id) => {
            let player = ctx
                .players
                .find(player_id)
                .await?
                .ok_or_else(|| DomainError::not_found("player", player_id))?;
            let ids = player
                .characters
                .iter()
                .copied()
                .filter(|id| *id != gm_character && members.contains(id))
                .collect();
            (player.member, ids)
        }
    };

    let mut characters = Vec::with_capacity(ids.len());
    for id in ids {
        match ctx.characters.find(id).await? {
            Some(character) => characters.push(character),
            None => warn!(character_id = %id, "session references a missing character"),
        }
    }
    Ok(Eligibility { member, characters })
}

enum Selection {
    Chosen(Character),
    TimedOut,
}

async fn select_character(
    ctx: &PostingContext<'_>,
    channel: &ChannelId,
    member: &MemberId,
    mut characters: Vec<Character>,
) -> Result<Selection, DomainError> {
    if characters.len() == 1 {
        return Ok(Selection::Chosen(characters.remove(0)));
    }

    let options: Vec<CharacterChoice> = characters
        .iter()
        .map(|c| CharacterChoice {
            id: c.id,
            name: c.name.clone(),
        })
        .collect();
    let chosen = match timeout(
        ctx.waits.selection,
        ctx.messaging.choose_character(channel, member, &options),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => None,
    };
    let Some(chosen) = chosen else {
        return Ok(Selection::TimedOut);
    };

    characters
        .into_iter()
        .find(|c| c.id == chosen)
        .map(Selection::Chosen)
        .ok_or_else(|| {
            DomainError::Validation(format!("character {chosen} was not offered for this post"))
        })
}

fn prompt_body(display_name: &str, character: &Character, on_turn: bool, lines: usize) -> String {
    let mut body = String::new();
    if !on_turn {
        body.push_str(&format!("It is not {}'s turn; posting anyway.\n", character.name));
    }
    body.push_str(&format!(
        "{display_name}, write your post as {}. Send `done` when finished or `cancel` to stop. \
         You can also upload a .txt file.\nLines collected: {lines}",
        character.name
    ));
    body
}

async fn dismiss_prompt(messaging: &dyn MessagingSurface, prompt: &MessageRef) {
    if let Err(e) = messaging.delete_message(prompt).await {
        warn!(message = %prompt, error = %e, "failed to delete prompt");
    }
}

enum Collected {
    Ready,
    Stopped(PostOutcome),
}

async fn collect_content(
    ctx: &PostingContext<'_>,
    attempt: &mut PostingAttempt,
    channel: &ChannelId,
    member: &MemberId,
    prompt: &MessageRef,
    render: impl Fn(usize) -> String,
) -> Result<Collected, DomainError> {
    loop {
        let reply = match timeout(ctx.waits.content, ctx.messaging.await_reply(channel, member)).await {
            Ok(Ok(Some(reply))) => reply,
            Ok(Ok(None)) | Err(_) => {
                attempt.time_out();
                info!("content collection timed out");
                return Ok(Collected::Stopped(PostOutcome::TimedOut));
            }
            Ok(Err(e)) => {
                attempt.cancel();
                return Err(e);
            }
        };

        match attempt.on_reply(&reply)? {
            ReplyStep::Continue => {
                if let Err(e) = ctx
                    .messaging
                    .edit_message(prompt, render(attempt.line_count()))
                    .await
                {
                    warn!(error = %e, "failed to update prompt");
                }
            }
            ReplyStep::Finished => return Ok(Collected::Ready),
            ReplyStep::Cancelled => {
                info!("posting cancelled by user");
                return Ok(Collected::Stopped(PostOutcome::Cancelled));
            }
            ReplyStep::FetchAttachment(attachment) => {
                match ctx.messaging.fetch_attachment_text(&attachment).await {
                    Ok(text) => {
                        if attempt.attach(text)? == ReplyStep::Cancelled {
                            info!(file_name = %attachment.file_name, "attachment was empty; posting cancelled");
                            return Ok(Collected::Stopped(PostOutcome::Cancelled));
                        }
                        return Ok(Collected::Ready);
                    }
                    Err(e) => {
                        attempt.cancel();
                        warn!(file_name = %attachment.file_name, error = %e, "attachment fetch failed");
                        return Err(match e {
                            DomainError::AttachmentFetchFailed(_) => e,
                            other => DomainError::AttachmentFetchFailed(other.to_string()),
                        });
                    }
                }
            }
        }
    }
}

/// Runs one posting attempt for `requester` in the session behind `handle`.
///
/// # Errors
///
/// Returns `DomainError::AttachmentFetchFailed` when an uploaded file could
/// not be read (nothing is published), `DomainError::PublishedButNotRecorded`
/// when messages went out but the post record could not be written (the turn
/// order is not advanced), `DomainError::NotFound` for an unknown player, or a
/// messaging/persistence error.
#[instrument(skip_all, fields(correlation_id = %request.correlation_id, requester = ?request.requester))]
pub async fn handle_post_request(
    ctx: &PostingContext<'_>,
    handle: &SessionHandle,
    request: &PostRequest,
) -> Result<PostOutcome, DomainError> {
    let Some(_guard) = handle.try_begin_posting() else {
        info!("posting already in progress");
        return Ok(PostOutcome::Busy);
    };

    let (session_id, session_channel) = handle.read(|s| (s.id, s.channel.clone()));
    let prompt_channel = request.prompt_channel.clone().unwrap_or_else(|| session_channel.clone());

    let eligibility = eligible_characters(ctx, handle, request.requester).await?;
    if eligibility.characters.is_empty() {
        info!("requester has no eligible characters");
        return Ok(PostOutcome::NoCharacters);
    }

    let mut attempt = PostingAttempt::new();
    let character = match select_character(
        ctx,
        &prompt_channel,
        &eligibility.member,
        eligibility.characters,
    )
    .await?
    {
        Selection::Chosen(character) => character,
        Selection::TimedOut => {
            attempt.time_out();
            info!("character selection timed out");
            return Ok(PostOutcome::TimedOut);
        }
    };
    attempt.select(character.id)?;

    let on_turn = handle.read(|s| s.engine().is_turn(character.id));
    if !on_turn {
        warn!(character_id = %character.id, "character is posting out of turn");
    }
    let profile = ctx.messaging.resolve_member(&eligibility.member).await?;
    let render = |lines| prompt_body(&profile.display_name, &character, on_turn, lines);
    let prompt = ctx
        .messaging
        .send_message(&prompt_channel, OutgoingMessage::plain(render(0)))
        .await?;

    let collected = collect_content(
        ctx,
        &mut attempt,
        &prompt_channel,
        &eligibility.member,
        &prompt,
        render,
    )
    .await;
    dismiss_prompt(ctx.messaging, &prompt).await;
    if let Collected::Stopped(outcome) = collected? {
        return Ok(outcome);
    }

    let chunks = attempt.chunk(MAX_CHUNK_LEN)?;
    let progression = handle.read(|s| s.engine().progression());
    let message_refs = publish_chunks(
        ctx.messaging,
        &session_channel,
        &character,
        progression,
        &chunks,
    )
    .await?;

    let record = PostRecord {
        id: PostId::new(),
        session_id,
        character_id: character.id,
        act: progression.act,
        chapter: progression.chapter,
        round: progression.round,
        content: attempt.content().unwrap_or_default().to_owned(),
        message_refs: message_refs.clone(),
        created_at: ctx.clock.now(),
    };
    if let Err(e) = ctx.posts.create(&record).await {
        warn!(error = %e, published = message_refs.len(), "post published but not recorded");
        return Err(DomainError::PublishedButNotRecorded {
            message_refs,
            reason: e.to_string(),
        });
    }

    commit(handle, ctx.sessions, ctx.notifier, |session| {
        Ok(session.record_post(character.id, request.correlation_id, ctx.clock))
    })
    .await?;
    attempt.finish()?;

    info!(post_id = %record.id, character_id = %character.id, chunks = chunks.len(), "post published");
    Ok(PostOutcome::Done(message_refs))
}
