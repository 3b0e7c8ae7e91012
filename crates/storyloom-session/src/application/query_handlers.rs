//! Query handlers for the Session & Turn Order context.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storyloom_character::application::query_handlers::PlayerView;
use storyloom_character::domain::repository::{CharacterRepository, PlayerRepository};
use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::error::DomainError;
use storyloom_core::identity::IdentityResolver;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, SessionId};
use tracing::instrument;

use super::registry::SessionHandle;
use crate::domain::aggregates::Session;
use crate::domain::turn_order::TurnGroup;

/// Read-only view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    /// Session identifier.
    pub id: SessionId,
    /// Session name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning community.
    pub guild: GuildId,
    /// The member acting as GM.
    pub gm_member: MemberId,
    /// The GM character.
    pub gm_character: CharacterId,
    /// `#RRGGBB` color tag.
    pub color: String,
    /// Publish target.
    pub channel: ChannelId,
    /// Act counter.
    pub act: u32,
    /// Chapter counter.
    pub chapter: u32,
    /// Round counter.
    pub round: u32,
    /// Round template.
    pub turn_order: Vec<TurnGroup>,
    /// Remaining groups of the active round.
    pub current_turn_order: Vec<TurnGroup>,
    /// Group whose turn it is.
    pub current_turn: Option<TurnGroup>,
    /// Turn length in milliseconds.
    pub turn_duration_ms: Option<i64>,
    /// Deadline of the active turn.
    pub turn_time: Option<DateTime<Utc>>,
    /// Whether a posting attempt is in flight.
    pub busy: bool,
    /// Member characters, GM included.
    pub characters: Vec<CharacterId>,
    /// Mutation count.
    pub version: i64,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        let engine = session.engine();
        let progression = engine.progression();
        Self {
            id: session.id,
            name: session.name.clone(),
            description: session.description.clone(),
            guild: session.guild.clone(),
            gm_member: session.gm_member.clone(),
            gm_character: session.gm_character(),
            color: session.color.to_string(),
            channel: session.channel.clone(),
            act: progression.act,
            chapter: progression.chapter,
            round: progression.round,
            turn_order: engine.turn_order().to_vec(),
            current_turn_order: engine.current_turn_order().iter().cloned().collect(),
            current_turn: engine.current_turn().cloned(),
            turn_duration_ms: engine.turn_duration().map(|d| d.num_milliseconds()),
            turn_time: engine.turn_time(),
            busy: session.is_busy(),
            characters: session.characters().iter().copied().collect(),
            version: session.version(),
        }
    }
}

/// Members expected to act now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhoMayPost {
    /// Characters on turn; just the GM character at a round boundary.
    pub character_ids: Vec<CharacterId>,
    /// Distinct members controlling those characters.
    pub members: Vec<MemberId>,
}

/// Retrieves a view of a live session.
#[must_use]
pub fn get_session_view(handle: &SessionHandle) -> SessionView {
    handle.read(|session| SessionView::from(session))
}

/// Resolves the current turn group, or the GM when no group is on turn, to
/// the members who control it.
///
/// # Errors
///
/// Returns `DomainError::IdentityResolutionFailed` if any character on turn
/// cannot be resolved. Failures are never skipped.
#[instrument(skip_all)]
pub async fn who_may_post(
    handle: &SessionHandle,
    resolver: &dyn IdentityResolver,
) -> Result<WhoMayPost, DomainError> {
    let (current, gm_character, gm_member) = handle.read(|session| {
        (
            session.engine().current_turn().cloned(),
            session.gm_character(),
            session.gm_member.clone(),
        )
    });

    let Some(group) = current else {
        return Ok(WhoMayPost {
            character_ids: vec![gm_character],
            members: vec![gm_member],
        });
    };

    let mut members = Vec::with_capacity(group.len());
    for character_id in group.iter() {
        let member = resolver.member_for(character_id).await?;
        if !members.contains(&member) {
            members.push(member);
        }
    }

    Ok(WhoMayPost {
        character_ids: group.iter().collect(),
        members,
    })
}

/// Lists the distinct players controlling the session's characters. The GM
/// character and unowned characters are skipped.
///
/// # Errors
///
/// Returns a persistence error.
pub async fn players_in_session(
    handle: &SessionHandle,
    characters: &dyn CharacterRepository,
    players: &dyn PlayerRepository,
) -> Result<Vec<PlayerView>, DomainError> {
    let (members, gm_character) = handle.read(|session| {
        (session.characters().clone(), session.gm_character())
    });

    let mut found = BTreeMap::new();
    for character_id in members.into_iter().filter(|id| *id != gm_character) {
        let Some(owner) = characters.find(character_id).await?.and_then(|c| c.owner) else {
            continue;
        };
        if found.contains_key(&owner) {
            continue;
        }
        if let Some(player) = players.find(owner).await? {
            found.insert(owner, player);
        }
    }

    Ok(found
        .into_values()
        .map(|player| PlayerView {
            id: player.id,
            member: player.member,
            display_name: player.display_name,
            characters: player.characters.into_iter().collect(),
        })
        .collect())
}
