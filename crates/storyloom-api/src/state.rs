//! Shared application state.

use std::sync::Arc;

use chrono::TimeDelta;
use sqlx::PgPool;
use storyloom_character::application::identity::RegistryIdentityResolver;
use storyloom_character::domain::repository::{
    CharacterRepository, InformationRepository, PlayerRepository,
};
use storyloom_core::clock::Clock;
use storyloom_core::identity::IdentityResolver;
use storyloom_posting::application::pipeline::{PostingContext, PostingWaits};
use storyloom_posting::domain::repository::PostRepository;
use storyloom_session::application::notifier::SessionNotifier;
use storyloom_session::application::registry::SessionRegistry;
use storyloom_session::domain::repository::SessionRepository;
use storyloom_store::pg_character_repository::PgCharacterRepository;
use storyloom_store::pg_information_repository::PgInformationRepository;
use storyloom_store::pg_player_repository::PgPlayerRepository;
use storyloom_store::pg_post_repository::PgPostRepository;
use storyloom_store::pg_session_repository::PgSessionRepository;
use storyloom_store::relay_outbox::{PgRelayOutbox, RelayOutbox};

use crate::relay::RelayMessaging;

/// Persistence ports the server is assembled from.
#[derive(Clone)]
pub struct Repositories {
    /// Session snapshots.
    pub sessions: Arc<dyn SessionRepository>,
    /// Characters and their information tiers.
    pub characters: Arc<dyn CharacterRepository>,
    /// Registered players.
    pub players: Arc<dyn PlayerRepository>,
    /// Information entries.
    pub information: Arc<dyn InformationRepository>,
    /// Post log.
    pub posts: Arc<dyn PostRepository>,
    /// Outgoing relay messages.
    pub outbox: Arc<dyn RelayOutbox>,
}

impl Repositories {
    /// PostgreSQL-backed repositories sharing `pool`.
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            sessions: Arc::new(PgSessionRepository::new(pool.clone())),
            characters: Arc::new(PgCharacterRepository::new(pool.clone())),
            players: Arc::new(PgPlayerRepository::new(pool.clone())),
            information: Arc::new(PgInformationRepository::new(pool.clone())),
            posts: Arc::new(PgPostRepository::new(pool.clone())),
            outbox: Arc::new(PgRelayOutbox::new(pool.clone())),
        }
    }
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Session snapshots.
    pub sessions: Arc<dyn SessionRepository>,
    /// Characters.
    pub characters: Arc<dyn CharacterRepository>,
    /// Players.
    pub players: Arc<dyn PlayerRepository>,
    /// Information entries.
    pub information: Arc<dyn InformationRepository>,
    /// Post log.
    pub posts: Arc<dyn PostRepository>,
    /// Character to member resolution.
    pub resolver: Arc<dyn IdentityResolver>,
    /// Live sessions.
    pub registry: Arc<SessionRegistry>,
    /// Panel-refresh fan-out.
    pub notifier: SessionNotifier,
    /// Messaging surface used by posting and section breaks.
    pub relay: Arc<RelayMessaging>,
    /// Posting deadlines.
    pub waits: PostingWaits,
    /// Turn length applied to new sessions.
    pub default_turn_duration: Option<TimeDelta>,
}

impl AppState {
    /// Assembles the state from its persistence ports.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        repositories: Repositories,
        waits: PostingWaits,
        default_turn_duration: Option<TimeDelta>,
    ) -> Self {
        let resolver = Arc::new(RegistryIdentityResolver::new(
            repositories.characters.clone(),
            repositories.players.clone(),
        ));
        let relay = Arc::new(RelayMessaging::new(repositories.outbox, clock.clone()));
        Self {
            clock,
            sessions: repositories.sessions,
            characters: repositories.characters,
            players: repositories.players,
            information: repositories.information,
            posts: repositories.posts,
            resolver,
            registry: Arc::new(SessionRegistry::new()),
            notifier: SessionNotifier::new(),
            relay,
            waits,
            default_turn_duration,
        }
    }

    /// Borrows the collaborators of a posting or undo request.
    #[must_use]
    pub fn posting_context(&self) -> PostingContext<'_> {
        PostingContext {
            clock: self.clock.as_ref(),
            sessions: self.sessions.as_ref(),
            notifier: &self.notifier,
            characters: self.characters.as_ref(),
            players: self.players.as_ref(),
            posts: self.posts.as_ref(),
            messaging: self.relay.as_ref(),
            resolver: self.resolver.as_ref(),
            waits: self.waits,
        }
    }
}
