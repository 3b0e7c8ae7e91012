//! `PostgreSQL` implementation of the `InformationRepository` trait.

use async_trait::async_trait;
use sqlx::PgPool;
use storyloom_character::domain::information::Information;
use storyloom_character::domain::repository::InformationRepository;
use storyloom_core::error::DomainError;
use storyloom_core::ids::InformationId;

use crate::error::StoreError;
use crate::pg_character_repository::{information_from_row, upsert_information};

/// PostgreSQL-backed information repository.
#[derive(Debug, Clone)]
pub struct PgInformationRepository {
    pool: PgPool,
}

impl PgInformationRepository {
    /// Creates a new `PgInformationRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InformationRepository for PgInformationRepository {
    async fn create(&self, information: &Information) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;
        upsert_information(&mut tx, information).await?;
        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn find(&self, id: InformationId) -> Result<Option<Information>, DomainError> {
        let row = sqlx::query("SELECT id, name, kind, value FROM information WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        row.as_ref()
            .map(information_from_row)
            .transpose()
            .map_err(Into::into)
    }

    async fn destroy(&self, id: InformationId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM information WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
