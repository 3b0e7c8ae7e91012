//! `PostgreSQL` implementation of the `SessionRepository` trait.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use storyloom_core::error::DomainError;
use storyloom_core::ids::{ChannelId, CharacterId, GuildId, MemberId, SessionId};
use storyloom_session::domain::aggregates::SessionSnapshot;
use storyloom_session::domain::repository::SessionRepository;
use storyloom_session::domain::turn_order::{Progression, TurnGroup};
use tracing::{debug, instrument};

use crate::error::{StoreError, to_u32};

const SELECT_SESSIONS: &str = r"
SELECT id, name, description, guild_id, gm_member_id, gm_character_id, color,
       channel_id, characters, act, chapter, round, turn_order,
       current_turn_order, turn_duration_ms, turn_time, version
FROM sessions";

/// PostgreSQL-backed session repository.
#[derive(Debug, Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    /// Creates a new `PgSessionRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn session_from_row(row: &PgRow) -> Result<SessionSnapshot, StoreError> {
    let color: String = row.try_get("color")?;
    let characters: Json<BTreeSet<CharacterId>> = row.try_get("characters")?;
    let turn_order: Json<Vec<TurnGroup>> = row.try_get("turn_order")?;
    let current_turn_order: Json<Vec<TurnGroup>> = row.try_get("current_turn_order")?;
    let turn_time: Option<DateTime<Utc>> = row.try_get("turn_time")?;

    Ok(SessionSnapshot {
        id: SessionId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        guild: GuildId::new(row.try_get::<String, _>("guild_id")?),
        gm_member: MemberId::new(row.try_get::<String, _>("gm_member_id")?),
        gm_character: CharacterId::from_uuid(row.try_get("gm_character_id")?),
        color: color.parse().map_err(|e| StoreError::corrupt("color", e))?,
        channel: ChannelId::new(row.try_get::<String, _>("channel_id")?),
        characters: characters.0,
        progression: Progression {
            act: to_u32(row.try_get("act")?, "act")?,
            chapter: to_u32(row.try_get("chapter")?, "chapter")?,
            round: to_u32(row.try_get("round")?, "round")?,
        },
        turn_order: turn_order.0,
        current_turn_order: current_turn_order.0,
        turn_duration_ms: row.try_get("turn_duration_ms")?,
        turn_time,
        version: row.try_get("version")?,
    })
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    #[instrument(skip_all, fields(session_id = %session.id))]
    async fn create(&self, session: &SessionSnapshot) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO sessions (
                id, name, description, guild_id, gm_member_id, gm_character_id,
                color, channel_id, characters, act, chapter, round, turn_order,
                current_turn_order, turn_duration_ms, turn_time, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ",
        )
        .bind(session.id.as_uuid())
        .bind(&session.name)
        .bind(&session.description)
        .bind(session.guild.as_str())
        .bind(session.gm_member.as_str())
        .bind(session.gm_character.as_uuid())
        .bind(session.color.to_string())
        .bind(session.channel.as_str())
        .bind(Json(&session.characters))
        .bind(i64::from(session.progression.act))
        .bind(i64::from(session.progression.chapter))
        .bind(i64::from(session.progression.round))
        .bind(Json(&session.turn_order))
        .bind(Json(&session.current_turn_order))
        .bind(session.turn_duration_ms)
        .bind(session.turn_time)
        .bind(session.version)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn find(&self, id: SessionId) -> Result<Option<SessionSnapshot>, DomainError> {
        let row = sqlx::query(&format!("{SELECT_SESSIONS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.as_ref()
            .map(session_from_row)
            .transpose()
            .map_err(Into::into)
    }

    async fn find_all(&self) -> Result<Vec<SessionSnapshot>, DomainError> {
        let rows = sqlx::query(&format!("{SELECT_SESSIONS} ORDER BY name, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        rows.iter()
            .map(session_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    #[instrument(skip_all, fields(session_id = %session.id, version = session.version))]
    async fn update(&self, session: &SessionSnapshot) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            UPDATE sessions SET
                name = $2, description = $3, color = $4, channel_id = $5,
                characters = $6, act = $7, chapter = $8, round = $9,
                turn_order = $10, current_turn_order = $11,
                turn_duration_ms = $12, turn_time = $13, version = $14
            WHERE id = $1 AND version < $14
            ",
        )
        .bind(session.id.as_uuid())
        .bind(&session.name)
        .bind(&session.description)
        .bind(session.color.to_string())
        .bind(session.channel.as_str())
        .bind(Json(&session.characters))
        .bind(i64::from(session.progression.act))
        .bind(i64::from(session.progression.chapter))
        .bind(i64::from(session.progression.round))
        .bind(Json(&session.turn_order))
        .bind(Json(&session.current_turn_order))
        .bind(session.turn_duration_ms)
        .bind(session.turn_time)
        .bind(session.version)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM sessions WHERE id = $1)")
                .bind(session.id.as_uuid())
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::from)?;
            if !exists {
                return Err(DomainError::not_found("session", session.id));
            }
            debug!("stored session is already newer; snapshot skipped");
        }
        Ok(())
    }
}
