//! `PostgreSQL` implementation of the `PostRepository` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use storyloom_core::error::DomainError;
use storyloom_core::ids::{CharacterId, MessageRef, PostId, SessionId};
use storyloom_posting::domain::post::PostRecord;
use storyloom_posting::domain::repository::PostRepository;
use tracing::instrument;

use crate::error::{StoreError, to_u32};

/// PostgreSQL-backed post log.
#[derive(Debug, Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Creates a new `PgPostRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &PgRow) -> Result<PostRecord, StoreError> {
    let message_refs: Json<Vec<MessageRef>> = row.try_get("message_refs")?;
    Ok(PostRecord {
        id: PostId::from_uuid(row.try_get("id")?),
        session_id: SessionId::from_uuid(row.try_get("session_id")?),
        character_id: CharacterId::from_uuid(row.try_get("character_id")?),
        act: to_u32(row.try_get("act")?, "act")?,
        chapter: to_u32(row.try_get("chapter")?, "chapter")?,
        round: to_u32(row.try_get("round")?, "round")?,
        content: row.try_get("content")?,
        message_refs: message_refs.0,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl PostRepository for PgPostRepository {
    #[instrument(skip_all, fields(post_id = %post.id, session_id = %post.session_id))]
    async fn create(&self, post: &PostRecord) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO posts (id, session_id, character_id, act, chapter, round, content, message_refs, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(post.id.as_uuid())
        .bind(post.session_id.as_uuid())
        .bind(post.character_id.as_uuid())
        .bind(i64::from(post.act))
        .bind(i64::from(post.chapter))
        .bind(i64::from(post.round))
        .bind(&post.content)
        .bind(Json(&post.message_refs))
        .bind(post.created_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;
        Ok(())
    }

    async fn find_latest_for_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<PostRecord>, DomainError> {
        let row = sqlx::query(
            r"
            SELECT id, session_id, character_id, act, chapter, round, content, message_refs, created_at
            FROM posts
            WHERE session_id = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT 1
            ",
        )
        .bind(session_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::from)?;
        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(Into::into)
    }

    async fn destroy(&self, id: PostId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
