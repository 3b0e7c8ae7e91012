//! Integration tests for `PgPostRepository` and `PgRelayOutbox`.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;
use storyloom_character::domain::aggregates::Character;
use storyloom_character::domain::repository::CharacterRepository;
use storyloom_core::color::Color;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, MessageRef, PostId, SessionId};
use storyloom_posting::domain::messaging::Author;
use storyloom_posting::domain::post::PostRecord;
use storyloom_posting::domain::repository::PostRepository;
use storyloom_session::domain::aggregates::SessionSnapshot;
use storyloom_session::domain::repository::SessionRepository;
use storyloom_session::domain::turn_order::Progression;
use storyloom_store::pg_character_repository::PgCharacterRepository;
use storyloom_store::pg_post_repository::PgPostRepository;
use storyloom_store::pg_session_repository::PgSessionRepository;
use storyloom_store::relay_outbox::{OutboxEntry, OutboxTarget, PgRelayOutbox, RelayOutbox};

fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, minute, 0).unwrap()
}

async fn stored_session(pool: &PgPool) -> SessionId {
    let gm = Character::new(CharacterId::new(), "The Narrator", Color::WHITE, None).unwrap();
    PgCharacterRepository::new(pool.clone())
        .create(&gm)
        .await
        .unwrap();
    let snapshot = SessionSnapshot {
        id: SessionId::new(),
        name: "Ashes of Vell".to_owned(),
        description: String::new(),
        guild: GuildId::new("guild-1"),
        gm_member: MemberId::new("m-gm"),
        gm_character: gm.id,
        color: Color::WHITE,
        channel: ChannelId::new("story"),
        characters: BTreeSet::from([gm.id]),
        progression: Progression::default(),
        turn_order: Vec::new(),
        current_turn_order: Vec::new(),
        turn_duration_ms: None,
        turn_time: None,
        version: 1,
    };
    PgSessionRepository::new(pool.clone())
        .create(&snapshot)
        .await
        .unwrap();
    snapshot.id
}

fn post(session_id: SessionId, created_at: DateTime<Utc>, refs: &[&str]) -> PostRecord {
    PostRecord {
        id: PostId::new(),
        session_id,
        character_id: CharacterId::new(),
        act: 1,
        chapter: 1,
        round: 2,
        content: "The lantern gutters.".to_owned(),
        message_refs: refs.iter().map(|r| MessageRef::new(*r)).collect(),
        created_at,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_latest_post_is_found_per_session(pool: PgPool) {
    // Arrange
    let repo = PgPostRepository::new(pool.clone());
    let session = stored_session(&pool).await;
    let other = stored_session(&pool).await;
    let older = post(session, at(0), &["m1"]);
    let newer = post(session, at(5), &["m2", "m3"]);
    repo.create(&newer).await.unwrap();
    repo.create(&older).await.unwrap();
    repo.create(&post(other, at(9), &["m4"])).await.unwrap();

    // Act
    let latest = repo.find_latest_for_session(session).await.unwrap().unwrap();

    // Assert
    assert_eq!(latest, newer);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_equal_timestamps_prefer_the_later_insert(pool: PgPool) {
    let repo = PgPostRepository::new(pool.clone());
    let session = stored_session(&pool).await;
    let first = post(session, at(1), &["m1"]);
    let second = post(session, at(1), &["m2"]);
    repo.create(&first).await.unwrap();
    repo.create(&second).await.unwrap();

    let latest = repo.find_latest_for_session(session).await.unwrap().unwrap();

    assert_eq!(latest.id, second.id);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_destroy_removes_only_the_record(pool: PgPool) {
    let repo = PgPostRepository::new(pool.clone());
    let session = stored_session(&pool).await;
    let older = post(session, at(0), &["m1"]);
    let newer = post(session, at(5), &["m2"]);
    repo.create(&older).await.unwrap();
    repo.create(&newer).await.unwrap();

    assert!(repo.destroy(newer.id).await.unwrap());
    assert!(!repo.destroy(newer.id).await.unwrap());
    assert_eq!(
        repo.find_latest_for_session(session).await.unwrap().unwrap().id,
        older.id
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_outbox_edits_and_deletes_live_messages(pool: PgPool) {
    // Arrange
    let outbox = PgRelayOutbox::new(pool);
    let entry = OutboxEntry {
        reference: MessageRef::new("relay-1"),
        target: OutboxTarget::Channel(ChannelId::new("story")),
        body: "Lines collected: 0".to_owned(),
        author: Some(Author {
            name: "Mira".to_owned(),
            color: Color::WHITE,
        }),
        footer: Some("Act 0 | Chapter 0 | Round 1".to_owned()),
        deleted: false,
        created_at: at(0),
    };
    outbox.append(&entry).await.unwrap();

    // Act
    let edited = outbox.edit(&entry.reference, "Lines collected: 1").await.unwrap();
    let deleted = outbox.mark_deleted(&entry.reference).await.unwrap();
    let deleted_again = outbox.mark_deleted(&entry.reference).await.unwrap();

    // Assert
    assert!(edited);
    assert!(deleted);
    assert!(!deleted_again);
    let stored = outbox.find(&entry.reference).await.unwrap().unwrap();
    assert_eq!(stored.body, "Lines collected: 1");
    assert_eq!(stored.author, entry.author);
    assert!(stored.deleted);
    assert!(outbox.list_channel(&ChannelId::new("story")).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_outbox_private_messages_stay_out_of_channels(pool: PgPool) {
    let outbox = PgRelayOutbox::new(pool);
    let private = OutboxEntry {
        reference: MessageRef::new("relay-2"),
        target: OutboxTarget::Member(MemberId::new("m-ash")),
        body: "Your post was undone".to_owned(),
        author: None,
        footer: None,
        deleted: false,
        created_at: at(0),
    };
    outbox.append(&private).await.unwrap();

    let listed = outbox.list_channel(&ChannelId::new("story")).await.unwrap();

    assert!(listed.is_empty());
    assert_eq!(outbox.find(&private.reference).await.unwrap(), Some(private));
}
