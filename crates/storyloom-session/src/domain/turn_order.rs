//! The turn-order engine.
//!
//! A session's `turn_order` is the template for a round: an ordered list of
//! turn groups, each a set of characters that may act concurrently. The
//! `current` queue is the working copy for the active round. Members leave the
//! head group as they post and emptied head groups are dequeued. Exhausting the
//! queue does not start a new round; only a GM post does.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use storyloom_core::error::DomainError;
use storyloom_core::ids::CharacterId;

/// A set of characters allowed to act in the same turn slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnGroup(BTreeSet<CharacterId>);

impl TurnGroup {
    /// A group holding exactly one character.
    #[must_use]
    pub fn single(character_id: CharacterId) -> Self {
        Self(BTreeSet::from([character_id]))
    }

    /// Whether `character_id` belongs to the group.
    #[must_use]
    pub fn contains(&self, character_id: CharacterId) -> bool {
        self.0.contains(&character_id)
    }

    /// Adds a member. Returns `false` if it was already present.
    pub fn insert(&mut self, character_id: CharacterId) -> bool {
        self.0.insert(character_id)
    }

    /// Removes a member. Returns `false` if it was absent.
    pub fn remove(&mut self, character_id: CharacterId) -> bool {
        self.0.remove(&character_id)
    }

    /// Whether the group has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates members in id order.
    pub fn iter(&self) -> impl Iterator<Item = CharacterId> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<CharacterId> for TurnGroup {
    fn from_iter<I: IntoIterator<Item = CharacterId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Nested progression counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    /// Act counter.
    pub act: u32,
    /// Chapter counter; reset when the act advances.
    pub chapter: u32,
    /// Round counter; reset when the chapter or act advances.
    pub round: u32,
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Act {} | Chapter {} | Round {}",
            self.act, self.chapter, self.round
        )
    }
}

/// How an undone post's author is put back into the current round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndoMode {
    /// Leave the turn order alone.
    #[default]
    None,
    /// Add the author to the head group, creating one if the queue is empty.
    Append,
    /// Push a new head group holding only the author.
    Front,
}

impl FromStr for UndoMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "append" => Ok(Self::Append),
            "front" => Ok(Self::Front),
            other => Err(DomainError::Validation(format!(
                "invalid undo mode {other:?}; expected none, append or front"
            ))),
        }
    }
}

impl fmt::Display for UndoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Append => "append",
            Self::Front => "front",
        })
    }
}

/// Round and turn state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOrderEngine {
    gm: CharacterId,
    progression: Progression,
    turn_order: Vec<TurnGroup>,
    current: VecDeque<TurnGroup>,
    turn_duration: Option<TimeDelta>,
    turn_time: Option<DateTime<Utc>>,
}

impl TurnOrderEngine {
    /// A fresh engine with zeroed counters and no turn order.
    #[must_use]
    pub fn new(gm: CharacterId) -> Self {
        Self {
            gm,
            progression: Progression::default(),
            turn_order: Vec::new(),
            current: VecDeque::new(),
            turn_duration: None,
            turn_time: None,
        }
    }

    /// Rebuilds an engine from persisted state.
    #[must_use]
    pub fn restore(
        gm: CharacterId,
        progression: Progression,
        turn_order: Vec<TurnGroup>,
        current: Vec<TurnGroup>,
        turn_duration: Option<TimeDelta>,
        turn_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            gm,
            progression,
            turn_order,
            current: current.into(),
            turn_duration,
            turn_time,
        }
    }

    /// The GM character, who is never queued and may always act.
    #[must_use]
    pub fn gm(&self) -> CharacterId {
        self.gm
    }

    /// Current counters.
    #[must_use]
    pub fn progression(&self) -> Progression {
        self.progression
    }

    /// The round template.
    #[must_use]
    pub fn turn_order(&self) -> &[TurnGroup] {
        &self.turn_order
    }

    /// Remaining groups of the active round, head first.
    #[must_use]
    pub fn current_turn_order(&self) -> &VecDeque<TurnGroup> {
        &self.current
    }

    /// Configured turn length.
    #[must_use]
    pub fn turn_duration(&self) -> Option<TimeDelta> {
        self.turn_duration
    }

    /// Deadline of the active turn.
    #[must_use]
    pub fn turn_time(&self) -> Option<DateTime<Utc>> {
        self.turn_time
    }

    /// Replaces the round template and empties the working queue so the next
    /// round starts fresh.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTurnOrder`, leaving the engine unchanged,
    /// if a group is empty, names the GM, or names a character outside
    /// `members`.
    pub fn set_turn_order(
        &mut self,
        groups: Vec<TurnGroup>,
        members: &BTreeSet<CharacterId>,
    ) -> Result<(), DomainError> {
        for (index, group) in groups.iter().enumerate() {
            if group.is_empty() {
                return Err(DomainError::InvalidTurnOrder(format!(
                    "turn group {} is empty",
                    index + 1
                )));
            }
            for character_id in group.iter() {
                if character_id == self.gm {
                    return Err(DomainError::InvalidTurnOrder(
                        "the GM character cannot be placed in the turn order".to_owned(),
                    ));
                }
                if !members.contains(&character_id) {
                    return Err(DomainError::InvalidTurnOrder(format!(
                        "character {character_id} is not part of this session"
                    )));
                }
            }
        }
        self.turn_order = groups;
        self.current.clear();
        Ok(())
    }

    /// The group whose turn it is, or `None` at a round boundary.
    #[must_use]
    pub fn current_turn(&self) -> Option<&TurnGroup> {
        self.current.front()
    }

    /// Whether `character_id` is expected to act now. Advisory only.
    #[must_use]
    pub fn is_turn(&self, character_id: CharacterId) -> bool {
        match self.current_turn() {
            Some(group) => group.contains(character_id),
            None => character_id == self.gm,
        }
    }

    /// Removes `character_id` from the head group, dequeuing the group once it
    /// empties. Returns whether the queue changed.
    pub fn advance(&mut self, character_id: CharacterId) -> bool {
        let Some(head) = self.current.front_mut() else {
            return false;
        };
        if !head.remove(character_id) {
            return false;
        }
        if head.is_empty() {
            self.current.pop_front();
        }
        true
    }

    /// Starts the next round from an independent copy of the template.
    pub fn new_round(&mut self) {
        self.progression.round += 1;
        self.current = self.turn_order.iter().cloned().collect();
    }

    /// Advances the chapter and resets the round.
    pub fn increment_chapter(&mut self) {
        self.progression.chapter += 1;
        self.progression.round = 0;
    }

    /// Advances the act and resets chapter and round.
    pub fn increment_act(&mut self) {
        self.progression.act += 1;
        self.progression.chapter = 0;
        self.progression.round = 0;
    }

    /// Changes the turn length. The deadline is not recomputed here.
    pub fn set_turn_duration(&mut self, turn_duration: Option<TimeDelta>) {
        self.turn_duration = turn_duration;
    }

    /// Recomputes the deadline as `now + turn_duration`, or clears it when no
    /// duration is configured.
    pub fn refresh_deadline(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.turn_time = self
            .turn_duration
            .and_then(|duration| now.checked_add_signed(duration));
        self.turn_time
    }

    /// Reverts the round bookkeeping after a post by `character_id` was undone.
    ///
    /// A GM post is reverted by stepping the round back and clearing the
    /// queue, regardless of `mode`.
    pub fn restore_after_undo(&mut self, character_id: CharacterId, mode: UndoMode) {
        if character_id == self.gm {
            self.progression.round = self.progression.round.saturating_sub(1);
            self.current.clear();
            return;
        }
        match mode {
            UndoMode::None => {}
            UndoMode::Append => match self.current.front_mut() {
                Some(head) => {
                    head.insert(character_id);
                }
                None => self.current.push_back(TurnGroup::single(character_id)),
            },
            UndoMode::Front => self.current.push_front(TurnGroup::single(character_id)),
        }
    }

    /// Strips a departing character from the template and the queue.
    pub fn remove_character(&mut self, character_id: CharacterId) {
        for group in self.turn_order.iter_mut().chain(self.current.iter_mut()) {
            group.remove(character_id);
        }
        self.turn_order.retain(|group| !group.is_empty());
        self.current.retain(|group| !group.is_empty());
    }
}
