//! `PostgreSQL` implementation of the `PlayerRepository` trait.
//!
//! Ownership is stored once, on `characters.owner_id`; a player's character
//! set is read back from there.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use storyloom_character::domain::aggregates::Player;
use storyloom_character::domain::repository::PlayerRepository;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, GuildId, MemberId, PlayerId};
use tracing::instrument;
use uuid::Uuid;

use crate::error::StoreError;

/// PostgreSQL-backed player repository.
#[derive(Debug, Clone)]
pub struct PgPlayerRepository {
    pool: PgPool,
}

impl PgPlayerRepository {
    /// Creates a new `PgPlayerRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: &PgRow) -> Result<Player, StoreError> {
        let id: Uuid = row.try_get("id")?;
        let mut player = Player::new(
            PlayerId::from_uuid(id),
            GuildId::new(row.try_get::<String, _>("guild_id")?),
            MemberId::new(row.try_get::<String, _>("member_id")?),
            row.try_get::<String, _>("display_name")?,
        );
        let owned: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM characters WHERE owner_id = $1")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        player
            .characters
            .extend(owned.into_iter().map(CharacterId::from_uuid));
        Ok(player)
    }
}

#[async_trait]
impl PlayerRepository for PgPlayerRepository {
    #[instrument(skip_all, fields(player_id = %player.id))]
    async fn create(&self, player: &Player) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO players (id, guild_id, member_id, display_name)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(player.id.as_uuid())
        .bind(player.guild.as_str())
        .bind(player.member.as_str())
        .bind(&player.display_name)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn find(&self, id: PlayerId) -> Result<Option<Player>, DomainError> {
        let row = sqlx::query("SELECT id, guild_id, member_id, display_name FROM players WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_member(
        &self,
        guild: &GuildId,
        member: &MemberId,
    ) -> Result<Option<Player>, DomainError> {
        let row = sqlx::query(
            r"
            SELECT id, guild_id, member_id, display_name FROM players
            WHERE guild_id = $1 AND member_id = $2
            ",
        )
        .bind(guild.as_str())
        .bind(member.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;
        match row {
            Some(row) => Ok(Some(self.hydrate(&row).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(player_id = %player.id))]
    async fn update(&self, player: &Player) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE players SET display_name = $2 WHERE id = $1")
            .bind(player.id.as_uuid())
            .bind(&player.display_name)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("player", player.id));
        }
        Ok(())
    }
}
