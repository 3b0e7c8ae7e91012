//! `PostgreSQL` implementation of the `CharacterRepository` trait.
//!
//! A character's information store is kept in `character_information`, one
//! row per entry naming its tier. Updates rewrite those rows wholesale inside
//! the same transaction as the character row.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use storyloom_character::domain::aggregates::Character;
use storyloom_character::domain::information::{Classification, Information, InformationKind};
use storyloom_character::domain::repository::CharacterRepository;
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, InformationId, PlayerId};
use tracing::instrument;
use uuid::Uuid;

use crate::error::StoreError;

/// PostgreSQL-backed character repository.
#[derive(Debug, Clone)]
pub struct PgCharacterRepository {
    pool: PgPool,
}

impl PgCharacterRepository {
    /// Creates a new `PgCharacterRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn information_from_row(row: &PgRow) -> Result<Information, StoreError> {
    let kind: String = row.try_get("kind")?;
    let value: String = row.try_get("value")?;
    Information::from_parts(
        InformationId::from_uuid(row.try_get("id")?),
        row.try_get::<String, _>("name")?,
        InformationKind::from(kind),
        &value,
    )
    .map_err(|e| StoreError::corrupt("value", e))
}

pub(crate) async fn upsert_information(
    tx: &mut Transaction<'_, Postgres>,
    information: &Information,
) -> Result<(), StoreError> {
    sqlx::query(
        r"
        INSERT INTO information (id, name, kind, value)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE SET name = $2, kind = $3, value = $4
        ",
    )
    .bind(information.id.as_uuid())
    .bind(&information.name)
    .bind(information.kind.as_str())
    .bind(information.value.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn write_tiers(
    tx: &mut Transaction<'_, Postgres>,
    character: &Character,
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM character_information WHERE character_id = $1")
        .bind(character.id.as_uuid())
        .execute(&mut **tx)
        .await?;

    for classification in Classification::ALL {
        for information in character.information.tier(classification).values() {
            upsert_information(tx, information).await?;
            sqlx::query(
                r"
                INSERT INTO character_information (character_id, information_id, classification)
                VALUES ($1, $2, $3)
                ",
            )
            .bind(character.id.as_uuid())
            .bind(information.id.as_uuid())
            .bind(classification.to_string())
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl CharacterRepository for PgCharacterRepository {
    #[instrument(skip_all, fields(character_id = %character.id))]
    async fn create(&self, character: &Character) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        sqlx::query(
            r"
            INSERT INTO characters (id, name, color, owner_id, knowledge)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(character.id.as_uuid())
        .bind(&character.name)
        .bind(character.color.to_string())
        .bind(character.owner.map(|owner| owner.as_uuid()))
        .bind(Json(&character.knowledge))
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        write_tiers(&mut tx, character).await?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn find(&self, id: CharacterId) -> Result<Option<Character>, DomainError> {
        let Some(row) = sqlx::query(
            "SELECT id, name, color, owner_id, knowledge FROM characters WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?
        else {
            return Ok(None);
        };

        let color: String = row.try_get("color").map_err(StoreError::from)?;
        let owner: Option<Uuid> = row.try_get("owner_id").map_err(StoreError::from)?;
        let knowledge: Json<Vec<String>> = row.try_get("knowledge").map_err(StoreError::from)?;
        let mut character = Character::new(
            id,
            row.try_get::<String, _>("name").map_err(StoreError::from)?,
            color
                .parse()
                .map_err(|e| StoreError::corrupt("color", e))?,
            owner.map(PlayerId::from_uuid),
        )
        .map_err(|e| StoreError::corrupt("name", e))?;
        character.knowledge = knowledge.0;

        let entries = sqlx::query(
            r"
            SELECT ci.classification, i.id, i.name, i.kind, i.value
            FROM character_information ci
            JOIN information i ON i.id = ci.information_id
            WHERE ci.character_id = $1
            ORDER BY i.name, i.id
            ",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;
        for entry in &entries {
            let classification: String = entry.try_get("classification").map_err(StoreError::from)?;
            let classification: Classification = classification
                .parse()
                .map_err(|e| StoreError::corrupt("classification", e))?;
            character
                .information
                .add(classification, information_from_row(entry)?);
        }
        Ok(Some(character))
    }

    #[instrument(skip_all, fields(character_id = %character.id))]
    async fn update(&self, character: &Character) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        let result = sqlx::query(
            r"
            UPDATE characters SET name = $2, color = $3, owner_id = $4, knowledge = $5
            WHERE id = $1
            ",
        )
        .bind(character.id.as_uuid())
        .bind(&character.name)
        .bind(character.color.to_string())
        .bind(character.owner.map(|owner| owner.as_uuid()))
        .bind(Json(&character.knowledge))
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("character", character.id));
        }
        write_tiers(&mut tx, character).await?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }
}
