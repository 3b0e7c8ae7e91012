//! Shared test table: a session with three players' characters and a GM.

use chrono::{TimeZone, Utc};
use storyloom_character::domain::aggregates::{Character, Player};
use storyloom_character::testing::{InMemoryCharacterRepository, InMemoryPlayerRepository};
use storyloom_core::color::Color;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, PlayerId, SessionId};
use storyloom_session::application::notifier::SessionNotifier;
use storyloom_session::application::registry::{SessionCell, SessionHandle};
use storyloom_session::domain::aggregates::{Session, SessionProfile};
use storyloom_session::domain::turn_order::TurnGroup;
use storyloom_session::testing::InMemorySessionRepository;
use storyloom_test_support::{FixedClock, StaticIdentityResolver};
use uuid::Uuid;

use crate::application::pipeline::{PostRequest, PostingContext, PostingWaits, Requester};
use crate::domain::repository::PostRepository;
use crate::testing::{InMemoryPostRepository, ScriptedMessaging};

pub(crate) struct Table {
    pub clock: FixedClock,
    pub sessions: InMemorySessionRepository,
    pub notifier: SessionNotifier,
    pub characters: InMemoryCharacterRepository,
    pub players: InMemoryPlayerRepository,
    pub posts: InMemoryPostRepository,
    pub messaging: ScriptedMessaging,
    pub resolver: StaticIdentityResolver,
    pub handle: SessionHandle,
    pub player: PlayerId,
    pub a: CharacterId,
    pub b: CharacterId,
    pub c: CharacterId,
    pub gm: CharacterId,
}

impl Table {
    /// Session with `[[A], [B, C]]` on round 1. Player "Ash" owns A and B.
    pub fn new() -> Self {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap());
        let mut player = Player::new(
            PlayerId::new(),
            GuildId::new("guild-1"),
            MemberId::new("m-ash"),
            "Ash",
        );
        let a = Character::new(CharacterId::new(), "Mira", Color::WHITE, Some(player.id)).unwrap();
        let b = Character::new(CharacterId::new(), "Tov", Color::WHITE, Some(player.id)).unwrap();
        let c = Character::new(CharacterId::new(), "Ren", Color::WHITE, None).unwrap();
        let gm = Character::new(CharacterId::new(), "The Narrator", Color::WHITE, None).unwrap();
        player.characters.extend([a.id, b.id]);

        let mut session = Session::create(
            SessionId::new(),
            SessionProfile {
                name: "Ashes of Vell".to_owned(),
                description: String::new(),
                guild: GuildId::new("guild-1"),
                gm_member: MemberId::new("m-gm"),
                color: Color::WHITE,
                channel: ChannelId::new("story"),
            },
            gm.id,
            Uuid::new_v4(),
            &clock,
        );
        for id in [a.id, b.id, c.id] {
            session.add_character(id, Uuid::new_v4(), &clock);
        }
        session
            .set_turn_order(
                vec![TurnGroup::single(a.id), [b.id, c.id].into_iter().collect()],
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        session.new_round(Uuid::new_v4(), &clock);
        let sessions = InMemorySessionRepository::with([session.snapshot()]);

        Self {
            clock,
            sessions,
            notifier: SessionNotifier::new(),
            resolver: StaticIdentityResolver::with([
                (a.id, MemberId::new("m-ash")),
                (b.id, MemberId::new("m-ash")),
            ]),
            handle: SessionCell::new(session),
            player: player.id,
            a: a.id,
            b: b.id,
            c: c.id,
            gm: gm.id,
            characters: InMemoryCharacterRepository::with([a, b, c, gm]),
            players: InMemoryPlayerRepository::with([player]),
            posts: InMemoryPostRepository::default(),
            messaging: ScriptedMessaging::new(),
        }
    }

    pub fn ctx(&self) -> PostingContext<'_> {
        self.ctx_with_posts(&self.posts)
    }

    pub fn ctx_with_posts<'a>(&'a self, posts: &'a dyn PostRepository) -> PostingContext<'a> {
        PostingContext {
            clock: &self.clock,
            sessions: &self.sessions,
            notifier: &self.notifier,
            characters: &self.characters,
            players: &self.players,
            posts,
            messaging: &self.messaging,
            resolver: &self.resolver,
            waits: PostingWaits::default(),
        }
    }

    pub fn request(&self, requester: Requester) -> PostRequest {
        PostRequest {
            correlation_id: Uuid::new_v4(),
            requester,
            prompt_channel: None,
        }
    }

    pub fn current(&self) -> Vec<TurnGroup> {
        self.handle
            .read(|s| s.engine().current_turn_order().iter().cloned().collect())
    }

    pub fn round(&self) -> u32 {
        self.handle.read(|s| s.engine().progression().round)
    }

    pub fn is_busy(&self) -> bool {
        self.handle.read(Session::is_busy)
    }
}
