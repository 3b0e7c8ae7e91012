//! Aggregate roots for the Session & Turn Order context.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::clock::Clock;
use storyloom_core::color::Color;
use storyloom_core::error::DomainError;
use storyloom_core::event::EventMetadata;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, SessionId};
use uuid::Uuid;

use super::events::{
    CharacterJoined, CharacterLeft, CharacterPosted, PostUndone, RoundStarted, SectionBreak,
    SectionKind, SessionCreated, SessionEvent, SessionEventKind, TurnDeadlineSet,
    TurnDurationSet, TurnOrderSet,
};
use super::turn_order::{Progression, TurnGroup, TurnOrderEngine, UndoMode};

/// Descriptive fields supplied when a session is created.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    /// Session name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning community.
    pub guild: GuildId,
    /// The member acting as GM.
    pub gm_member: MemberId,
    /// Color tag.
    pub color: Color,
    /// Channel posts are published to.
    pub channel: ChannelId,
}

/// Persisted form of a session. The `busy` flag is process-local and never
/// part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
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
    /// Color tag.
    pub color: Color,
    /// Publish target.
    pub channel: ChannelId,
    /// Member characters, GM included.
    pub characters: BTreeSet<CharacterId>,
    /// Progression counters.
    pub progression: Progression,
    /// Round template.
    pub turn_order: Vec<TurnGroup>,
    /// Remaining groups of the active round.
    pub current_turn_order: Vec<TurnGroup>,
    /// Turn length in milliseconds.
    pub turn_duration_ms: Option<i64>,
    /// Deadline of the active turn.
    pub turn_time: Option<DateTime<Utc>>,
    /// Mutation count.
    pub version: i64,
}

/// The aggregate root for a roleplay session.
#[derive(Debug)]
pub struct Session {
    /// Aggregate identifier.
    pub id: SessionId,
    /// Session name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Owning community.
    pub guild: GuildId,
    /// The member acting as GM.
    pub gm_member: MemberId,
    /// Color tag.
    pub color: Color,
    /// Publish target.
    pub channel: ChannelId,
    characters: BTreeSet<CharacterId>,
    engine: TurnOrderEngine,
    busy: bool,
    version: i64,
    uncommitted_events: Vec<SessionEvent>,
}

impl Session {
    /// Creates a session whose only member is its GM character, producing a
    /// `SessionCreated` event.
    pub fn create(
        id: SessionId,
        profile: SessionProfile,
        gm_character: CharacterId,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        let mut session = Self {
            id,
            name: profile.name,
            description: profile.description,
            guild: profile.guild,
            gm_member: profile.gm_member,
            color: profile.color,
            channel: profile.channel,
            characters: BTreeSet::from([gm_character]),
            engine: TurnOrderEngine::new(gm_character),
            busy: false,
            version: 0,
            uncommitted_events: Vec::new(),
        };
        let name = session.name.clone();
        session.record(
            correlation_id,
            clock,
            SessionEventKind::SessionCreated(SessionCreated {
                session_id: id,
                gm_character,
                name,
            }),
        );
        session
    }

    /// Rebuilds a session from its persisted snapshot. The session is never
    /// busy after a restore.
    #[must_use]
    pub fn restore(snapshot: SessionSnapshot) -> Self {
        let engine = TurnOrderEngine::restore(
            snapshot.gm_character,
            snapshot.progression,
            snapshot.turn_order,
            snapshot.current_turn_order,
            snapshot.turn_duration_ms.map(TimeDelta::milliseconds),
            snapshot.turn_time,
        );
        Self {
            id: snapshot.id,
            name: snapshot.name,
            description: snapshot.description,
            guild: snapshot.guild,
            gm_member: snapshot.gm_member,
            color: snapshot.color,
            channel: snapshot.channel,
            characters: snapshot.characters,
            engine,
            busy: false,
            version: snapshot.version,
            uncommitted_events: Vec::new(),
        }
    }

    /// Captures the persistable state.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            guild: self.guild.clone(),
            gm_member: self.gm_member.clone(),
            gm_character: self.engine.gm(),
            color: self.color,
            channel: self.channel.clone(),
            characters: self.characters.clone(),
            progression: self.engine.progression(),
            turn_order: self.engine.turn_order().to_vec(),
            current_turn_order: self.engine.current_turn_order().iter().cloned().collect(),
            turn_duration_ms: self.engine.turn_duration().map(|d| d.num_milliseconds()),
            turn_time: self.engine.turn_time(),
            version: self.version,
        }
    }

    /// The GM character.
    #[must_use]
    pub fn gm_character(&self) -> CharacterId {
        self.engine.gm()
    }

    /// Member characters, GM included.
    #[must_use]
    pub fn characters(&self) -> &BTreeSet<CharacterId> {
        &self.characters
    }

    /// Read access to the turn-order engine.
    #[must_use]
    pub fn engine(&self) -> &TurnOrderEngine {
        &self.engine
    }

    /// Whether a posting attempt is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Claims the posting slot. Returns `false` if another attempt holds it.
    pub fn try_mark_busy(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Releases the posting slot.
    pub fn clear_busy(&mut self) {
        self.busy = false;
    }

    fn record(&mut self, correlation_id: Uuid, clock: &dyn Clock, kind: SessionEventKind) {
        self.version += 1;
        let event = SessionEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                aggregate_id: self.id.as_uuid(),
                version: self.version,
                correlation_id,
                occurred_at: clock.now(),
            },
            kind,
        };
        self.uncommitted_events.push(event);
    }

    fn refresh_deadline(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        let turn_time = self.engine.refresh_deadline(clock.now());
        self.record(
            correlation_id,
            clock,
            SessionEventKind::TurnDeadlineSet(TurnDeadlineSet {
                session_id: self.id,
                turn_time,
            }),
        );
    }

    /// Adds a character to the session, producing a `CharacterJoined` event.
    /// Adding an existing member is a no-op.
    pub fn add_character(&mut self, character_id: CharacterId, correlation_id: Uuid, clock: &dyn Clock) {
        if !self.characters.insert(character_id) {
            return;
        }
        self.record(
            correlation_id,
            clock,
            SessionEventKind::CharacterJoined(CharacterJoined {
                session_id: self.id,
                character_id,
            }),
        );
    }

    /// Removes a character and strips it from both turn orders.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for the GM character, or
    /// `DomainError::NotFound` if the character is not a member.
    pub fn remove_character(
        &mut self,
        character_id: CharacterId,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if character_id == self.engine.gm() {
            return Err(DomainError::Validation(
                "the GM character cannot leave its session".to_owned(),
            ));
        }
        if !self.characters.remove(&character_id) {
            return Err(DomainError::not_found("session character", character_id));
        }
        self.engine.remove_character(character_id);
        self.record(
            correlation_id,
            clock,
            SessionEventKind::CharacterLeft(CharacterLeft {
                session_id: self.id,
                character_id,
            }),
        );
        Ok(())
    }

    /// Replaces the round template, producing a `TurnOrderSet` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTurnOrder` if the groups reference the GM,
    /// a non-member, or contain an empty group. The session is unchanged.
    pub fn set_turn_order(
        &mut self,
        groups: Vec<TurnGroup>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.engine.set_turn_order(groups, &self.characters)?;
        let turn_order = self.engine.turn_order().to_vec();
        self.record(
            correlation_id,
            clock,
            SessionEventKind::TurnOrderSet(TurnOrderSet {
                session_id: self.id,
                turn_order,
            }),
        );
        self.refresh_deadline(correlation_id, clock);
        Ok(())
    }

    /// Applies a published post to the turn order. A GM post starts a new
    /// round; any other post advances the head group. Returns whether the
    /// author was on turn when posting.
    pub fn record_post(&mut self, character_id: CharacterId, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let on_turn = self.engine.is_turn(character_id);
        let removed_from_turn = if character_id == self.engine.gm() {
            false
        } else {
            self.engine.advance(character_id)
        };
        self.record(
            correlation_id,
            clock,
            SessionEventKind::CharacterPosted(CharacterPosted {
                session_id: self.id,
                character_id,
                removed_from_turn,
            }),
        );
        if character_id == self.engine.gm() {
            self.start_round(correlation_id, clock);
        }
        self.refresh_deadline(correlation_id, clock);
        on_turn
    }

    /// Starts a new round explicitly.
    pub fn new_round(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        self.start_round(correlation_id, clock);
        self.refresh_deadline(correlation_id, clock);
    }

    fn start_round(&mut self, correlation_id: Uuid, clock: &dyn Clock) {
        self.engine.new_round();
        let round = self.engine.progression().round;
        self.record(
            correlation_id,
            clock,
            SessionEventKind::RoundStarted(RoundStarted {
                session_id: self.id,
                round,
            }),
        );
    }

    /// Advances the chapter, producing a `SectionBreak` event.
    pub fn increment_chapter(
        &mut self,
        title: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> SectionBreak {
        self.engine.increment_chapter();
        self.section_break(SectionKind::Chapter, title, correlation_id, clock)
    }

    /// Advances the act, producing a `SectionBreak` event.
    pub fn increment_act(
        &mut self,
        title: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> SectionBreak {
        self.engine.increment_act();
        self.section_break(SectionKind::Act, title, correlation_id, clock)
    }

    fn section_break(
        &mut self,
        kind: SectionKind,
        title: Option<String>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> SectionBreak {
        let progression = self.engine.progression();
        let section = SectionBreak {
            session_id: self.id,
            kind,
            act: progression.act,
            chapter: progression.chapter,
            title,
        };
        self.record(
            correlation_id,
            clock,
            SessionEventKind::SectionBreak(section.clone()),
        );
        section
    }

    /// Reverts the bookkeeping of an undone post, producing a `PostUndone`
    /// event and a fresh deadline.
    pub fn restore_after_undo(
        &mut self,
        character_id: CharacterId,
        mode: UndoMode,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        self.engine.restore_after_undo(character_id, mode);
        self.record(
            correlation_id,
            clock,
            SessionEventKind::PostUndone(PostUndone {
                session_id: self.id,
                character_id,
                mode,
            }),
        );
        self.refresh_deadline(correlation_id, clock);
    }

    /// Changes the turn length and recomputes the deadline.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the duration is not positive.
    pub fn set_turn_duration(
        &mut self,
        turn_duration: Option<TimeDelta>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if turn_duration.is_some_and(|d| d <= TimeDelta::zero()) {
            return Err(DomainError::Validation(
                "turn duration must be positive".to_owned(),
            ));
        }
        self.engine.set_turn_duration(turn_duration);
        self.record(
            correlation_id,
            clock,
            SessionEventKind::TurnDurationSet(TurnDurationSet {
                session_id: self.id,
                turn_duration_ms: turn_duration.map(|d| d.num_milliseconds()),
            }),
        );
        self.refresh_deadline(correlation_id, clock);
        Ok(())
    }
}

impl AggregateRoot for Session {
    type Event = SessionEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
