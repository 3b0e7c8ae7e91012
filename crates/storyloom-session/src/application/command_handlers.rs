//! Command handlers for the Session & Turn Order context.
//!
//! Every handler mutates the live session under its lock, persists the
//! resulting snapshot and then announces the committed events.

use chrono::TimeDelta;
use storyloom_character::domain::aggregates::Character;
use storyloom_character::domain::repository::CharacterRepository;
use storyloom_core::aggregate::AggregateRoot;
use storyloom_core::clock::Clock;
use storyloom_core::color::Color;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, SessionId};
use tracing::{error, info, instrument};

use super::notifier::SessionNotifier;
use super::registry::{SessionHandle, SessionRegistry};
use crate::domain::aggregates::{Session, SessionProfile};
use crate::domain::commands::{
    AddSessionCharacter, CreateSession, IncrementAct, IncrementChapter, RemoveSessionCharacter,
    SetTurnDuration, SetTurnOrder,
};
use crate::domain::events::SectionBreak;
use crate::domain::repository::SessionRepository;
use crate::domain::turn_order::TurnGroup;

/// Applies `f` to the live session, persists the snapshot and publishes the
/// produced events.
///
/// # Errors
///
/// Returns the error from `f` (nothing is persisted or announced), or a
/// persistence error from the repository.
pub async fn commit<R>(
    handle: &SessionHandle,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
    f: impl FnOnce(&mut Session) -> Result<R, DomainError>,
) -> Result<R, DomainError> {
    let (value, snapshot, events) = handle.mutate(f)?;
    if let Err(e) = sessions.update(&snapshot).await {
        error!(session_id = %snapshot.id, version = snapshot.version, error = %e, "failed to persist session");
        return Err(e);
    }
    notifier.publish(&events);
    Ok(value)
}

/// Handles the `CreateSession` command: creates the GM character, then the
/// session with zeroed counters and empty turn orders.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed color or blank GM name,
/// or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, name = %command.name))]
pub async fn handle_create_session(
    command: &CreateSession,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    characters: &dyn CharacterRepository,
    notifier: &SessionNotifier,
) -> Result<SessionHandle, DomainError> {
    let color = command
        .color
        .as_deref()
        .map(str::parse::<Color>)
        .transpose()?
        .unwrap_or_default();
    let gm = Character::new(CharacterId::new(), command.gm_name.clone(), color, None)?;
    characters.create(&gm).await?;

    let mut session = Session::create(
        SessionId::new(),
        SessionProfile {
            name: command.name.clone(),
            description: command.description.clone(),
            guild: command.guild.clone(),
            gm_member: command.gm_member.clone(),
            color,
            channel: command.channel.clone(),
        },
        gm.id,
        command.correlation_id,
        clock,
    );
    let events = session.take_uncommitted_events();
    sessions.create(&session.snapshot()).await?;

    info!(session_id = %session.id, gm_character = %gm.id, "session created");
    let handle = registry.insert(session);
    notifier.publish(&events);
    Ok(handle)
}

/// Handles the `SetTurnOrder` command.
///
/// # Errors
///
/// Returns `DomainError::InvalidTurnOrder` (the old order is retained),
/// `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id))]
pub async fn handle_set_turn_order(
    command: &SetTurnOrder,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
) -> Result<(), DomainError> {
    let handle = registry.require(command.session_id)?;
    let groups: Vec<TurnGroup> = command
        .turn_order
        .iter()
        .map(|group| group.iter().copied().collect())
        .collect();

    commit(&handle, sessions, notifier, |session| {
        session.set_turn_order(groups, command.correlation_id, clock)
    })
    .await?;

    info!(groups = command.turn_order.len(), "turn order set");
    Ok(())
}

/// Handles the `IncrementAct` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id))]
pub async fn handle_increment_act(
    command: &IncrementAct,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
) -> Result<SectionBreak, DomainError> {
    let handle = registry.require(command.session_id)?;
    let section = commit(&handle, sessions, notifier, |session| {
        Ok(session.increment_act(command.title.clone(), command.correlation_id, clock))
    })
    .await?;

    info!(act = section.act, "act started");
    Ok(section)
}

/// Handles the `IncrementChapter` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id))]
pub async fn handle_increment_chapter(
    command: &IncrementChapter,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
) -> Result<SectionBreak, DomainError> {
    let handle = registry.require(command.session_id)?;
    let section = commit(&handle, sessions, notifier, |session| {
        Ok(session.increment_chapter(command.title.clone(), command.correlation_id, clock))
    })
    .await?;

    info!(act = section.act, chapter = section.chapter, "chapter started");
    Ok(section)
}

/// Handles the `SetTurnDuration` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive duration,
/// `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id))]
pub async fn handle_set_turn_duration(
    command: &SetTurnDuration,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
) -> Result<(), DomainError> {
    let handle = registry.require(command.session_id)?;
    let duration = command.turn_duration_ms.map(TimeDelta::milliseconds);

    commit(&handle, sessions, notifier, |session| {
        session.set_turn_duration(duration, command.correlation_id, clock)
    })
    .await?;

    info!(turn_duration_ms = ?command.turn_duration_ms, "turn duration set");
    Ok(())
}

/// Handles the `AddSessionCharacter` command.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session or character, or a
/// persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id, character_id = %command.character_id))]
pub async fn handle_add_session_character(
    command: &AddSessionCharacter,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    characters: &dyn CharacterRepository,
    notifier: &SessionNotifier,
) -> Result<(), DomainError> {
    let handle = registry.require(command.session_id)?;
    if characters.find(command.character_id).await?.is_none() {
        return Err(DomainError::not_found("character", command.character_id));
    }

    commit(&handle, sessions, notifier, |session| {
        session.add_character(command.character_id, command.correlation_id, clock);
        Ok(())
    })
    .await?;

    info!("character joined session");
    Ok(())
}

/// Handles the `RemoveSessionCharacter` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` for the GM character,
/// `DomainError::NotFound`, or a persistence error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id, session_id = %command.session_id, character_id = %command.character_id))]
pub async fn handle_remove_session_character(
    command: &RemoveSessionCharacter,
    clock: &dyn Clock,
    registry: &SessionRegistry,
    sessions: &dyn SessionRepository,
    notifier: &SessionNotifier,
) -> Result<(), DomainError> {
    let handle = registry.require(command.session_id)?;

    commit(&handle, sessions, notifier, |session| {
        session.remove_character(command.character_id, command.correlation_id, clock)
    })
    .await?;

    info!("character left session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};
    use storyloom_character::testing::InMemoryCharacterRepository;
    use storyloom_core::ids::{ChannelId, GuildId, MemberId};
    use storyloom_test_support::FixedClock;
    use uuid::Uuid;

    use super::*;
    use crate::application::notifier::SessionNotice;
    use crate::testing::{FailingSessionRepository, InMemorySessionRepository};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    struct Fixture {
        clock: FixedClock,
        registry: SessionRegistry,
        sessions: InMemorySessionRepository,
        characters: InMemoryCharacterRepository,
        notifier: SessionNotifier,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                clock: FixedClock(fixed_now()),
                registry: SessionRegistry::new(),
                sessions: InMemorySessionRepository::default(),
                characters: InMemoryCharacterRepository::default(),
                notifier: SessionNotifier::new(),
            }
        }

        async fn create_session(&self) -> SessionHandle {
            let command = CreateSession {
                correlation_id: Uuid::new_v4(),
                name: "Ashes of Vell".to_owned(),
                description: "A slow-burn mystery".to_owned(),
                guild: GuildId::new("guild-1"),
                gm_member: MemberId::new("gm-1"),
                gm_name: "The Narrator".to_owned(),
                color: Some("#AA3300".to_owned()),
                channel: ChannelId::new("story"),
            };
            handle_create_session(
                &command,
                &self.clock,
                &self.registry,
                &self.sessions,
                &self.characters,
                &self.notifier,
            )
            .await
            .unwrap()
        }

        async fn join(&self, session_id: SessionId) -> CharacterId {
            let character =
                Character::new(CharacterId::new(), "Mira", Color::WHITE, None).unwrap();
            self.characters.create(&character).await.unwrap();
            handle_add_session_character(
                &AddSessionCharacter {
                    correlation_id: Uuid::new_v4(),
                    session_id,
                    character_id: character.id,
                },
                &self.clock,
                &self.registry,
                &self.sessions,
                &self.characters,
                &self.notifier,
            )
            .await
            .unwrap();
            character.id
        }
    }

    #[tokio::test]
    async fn test_create_session_provisions_gm_character() {
        // Arrange
        let fixture = Fixture::new();

        // Act
        let handle = fixture.create_session().await;

        // Assert
        let (session_id, gm) = handle.read(|s| (s.id, s.gm_character()));
        let gm_character = fixture.characters.get(gm).unwrap();
        assert_eq!(gm_character.name, "The Narrator");
        assert_eq!(gm_character.owner, None);
        let stored = fixture.sessions.get(session_id).unwrap();
        assert_eq!(stored.progression.round, 0);
        assert!(stored.turn_order.is_empty());
        assert!(fixture.registry.get(session_id).is_some());
    }

    #[tokio::test]
    async fn test_create_session_rejects_malformed_color() {
        let fixture = Fixture::new();
        let command = CreateSession {
            correlation_id: Uuid::new_v4(),
            name: "Ashes of Vell".to_owned(),
            description: String::new(),
            guild: GuildId::new("guild-1"),
            gm_member: MemberId::new("gm-1"),
            gm_name: "The Narrator".to_owned(),
            color: Some("red".to_owned()),
            channel: ChannelId::new("story"),
        };

        let result = handle_create_session(
            &command,
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.characters,
            &fixture.notifier,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(fixture.registry.is_empty());
    }

    #[tokio::test]
    async fn test_set_turn_order_persists_and_notifies() {
        // Arrange
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let session_id = handle.read(|s| s.id);
        let a = fixture.join(session_id).await;
        let mut receiver = fixture.notifier.subscribe();

        // Act
        handle_set_turn_order(
            &SetTurnOrder {
                correlation_id: Uuid::new_v4(),
                session_id,
                turn_order: vec![vec![a]],
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await
        .unwrap();

        // Assert
        let stored = fixture.sessions.get(session_id).unwrap();
        assert_eq!(stored.turn_order, vec![TurnGroup::single(a)]);
        assert!(stored.current_turn_order.is_empty());
        assert!(matches!(
            receiver.try_recv().unwrap(),
            SessionNotice::PanelRefresh { .. }
        ));
    }

    #[tokio::test]
    async fn test_set_turn_order_with_gm_is_rejected_and_not_persisted() {
        // Arrange
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let (session_id, gm) = handle.read(|s| (s.id, s.gm_character()));
        let version_before = fixture.sessions.get(session_id).unwrap().version;

        // Act
        let result = handle_set_turn_order(
            &SetTurnOrder {
                correlation_id: Uuid::new_v4(),
                session_id,
                turn_order: vec![vec![gm]],
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await;

        // Assert
        match result.unwrap_err() {
            DomainError::InvalidTurnOrder(_) => {}
            other => panic!("expected InvalidTurnOrder, got {other:?}"),
        }
        assert_eq!(fixture.sessions.get(session_id).unwrap().version, version_before);
    }

    #[tokio::test]
    async fn test_increment_act_returns_section_break() {
        // Arrange
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let session_id = handle.read(|s| s.id);

        // Act
        let section = handle_increment_act(
            &IncrementAct {
                correlation_id: Uuid::new_v4(),
                session_id,
                title: Some("Finale".to_owned()),
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(section.heading(), "Act 1: Finale");
        let stored = fixture.sessions.get(session_id).unwrap();
        assert_eq!(stored.progression.act, 1);
        assert_eq!(stored.progression.chapter, 0);
    }

    #[tokio::test]
    async fn test_set_turn_duration_sets_deadline() {
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let session_id = handle.read(|s| s.id);

        handle_set_turn_duration(
            &SetTurnDuration {
                correlation_id: Uuid::new_v4(),
                session_id,
                turn_duration_ms: Some(3_600_000),
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await
        .unwrap();

        let stored = fixture.sessions.get(session_id).unwrap();
        assert_eq!(stored.turn_duration_ms, Some(3_600_000));
        assert_eq!(stored.turn_time, Some(fixed_now() + TimeDelta::hours(1)));
    }

    #[tokio::test]
    async fn test_add_unknown_character_returns_not_found() {
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let session_id = handle.read(|s| s.id);

        let result = handle_add_session_character(
            &AddSessionCharacter {
                correlation_id: Uuid::new_v4(),
                session_id,
                character_id: CharacterId::new(),
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.characters,
            &fixture.notifier,
        )
        .await;

        assert!(matches!(result, Err(DomainError::NotFound { entity: "character", .. })));
    }

    #[tokio::test]
    async fn test_remove_character_strips_turn_orders() {
        // Arrange
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let session_id = handle.read(|s| s.id);
        let a = fixture.join(session_id).await;
        let b = fixture.join(session_id).await;
        handle_set_turn_order(
            &SetTurnOrder {
                correlation_id: Uuid::new_v4(),
                session_id,
                turn_order: vec![vec![a], vec![b]],
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await
        .unwrap();

        // Act
        handle_remove_session_character(
            &RemoveSessionCharacter {
                correlation_id: Uuid::new_v4(),
                session_id,
                character_id: a,
            },
            &fixture.clock,
            &fixture.registry,
            &fixture.sessions,
            &fixture.notifier,
        )
        .await
        .unwrap();

        // Assert
        let stored = fixture.sessions.get(session_id).unwrap();
        assert_eq!(stored.turn_order, vec![TurnGroup::single(b)]);
        assert!(!stored.characters.contains(&a));
    }

    #[tokio::test]
    async fn test_commit_surfaces_persistence_failure_without_notifying() {
        // Arrange
        let fixture = Fixture::new();
        let handle = fixture.create_session().await;
        let mut receiver = fixture.notifier.subscribe();

        // Act
        let result = commit(&handle, &FailingSessionRepository, &fixture.notifier, |session| {
            session.new_round(Uuid::new_v4(), &fixture.clock);
            Ok(())
        })
        .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(receiver.try_recv().is_err());
    }
}
