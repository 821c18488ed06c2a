//! PostgreSQL reaction store
//!
//! One transaction per toggle. The caller's row is locked with
//! `SELECT ... FOR UPDATE`; a soft-deleted row is revived instead of inserting a
//! second one, because the `(live_streaming_id, user_id)` unique constraint
//! also covers deleted rows.

use super::store::{ReactionStore, StoreError};
use crate::models::{toggled, ReactionType, RoomId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

#[derive(Clone)]
pub struct PgReactionStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ReactionRecord {
    id: i64,
    #[sqlx(rename = "type")]
    reaction_type: String,
    deleted_at: Option<DateTime<Utc>>,
}

impl PgReactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReactionStore for PgReactionStore {
    async fn apply_toggle(
        &self,
        room: RoomId,
        user: UserId,
        requested: ReactionType,
    ) -> Result<Option<ReactionType>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let room_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM live_streaming WHERE id = $1)")
                .bind(room)
                .fetch_one(&mut *tx)
                .await?;
        if !room_exists {
            return Err(StoreError::NotFound(format!("live streaming {room}")));
        }

        let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(user)
            .fetch_one(&mut *tx)
            .await?;
        if !user_exists {
            return Err(StoreError::NotFound(format!("user {user}")));
        }

        let existing = sqlx::query_as::<_, ReactionRecord>(
            r#"
            SELECT id, type, deleted_at
            FROM live_streaming_reaction
            WHERE live_streaming_id = $1 AND user_id = $2
            FOR UPDATE
            "#,
        )
        .bind(room)
        .bind(user)
        .fetch_optional(&mut *tx)
        .await?;

        let next = match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO live_streaming_reaction (live_streaming_id, user_id, type)
                    VALUES ($1, $2, $3)
                    "#,
                )
                .bind(room)
                .bind(user)
                .bind(requested.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| classify(e, room, user))?;

                Some(requested)
            }
            Some(record) => {
                let current = match record.deleted_at {
                    Some(_) => None,
                    None => Some(parse_type(&record.reaction_type)?),
                };

                let next = toggled(current, requested);
                match next {
                    Some(reaction_type) => {
                        sqlx::query(
                            r#"
                            UPDATE live_streaming_reaction
                            SET type = $2, deleted_at = NULL, updated_at = NOW()
                            WHERE id = $1
                            "#,
                        )
                        .bind(record.id)
                        .bind(reaction_type.as_str())
                        .execute(&mut *tx)
                        .await?;
                    }
                    None => {
                        sqlx::query(
                            r#"
                            UPDATE live_streaming_reaction
                            SET deleted_at = NOW(), updated_at = NOW()
                            WHERE id = $1
                            "#,
                        )
                        .bind(record.id)
                        .execute(&mut *tx)
                        .await?;
                    }
                }
                next
            }
        };

        tx.commit().await?;

        debug!(room, user, ?next, "Reaction toggle committed");
        Ok(next)
    }

    async fn find_active(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Option<ReactionType>, StoreError> {
        let raw: Option<String> = sqlx::query_scalar(
            r#"
            SELECT type
            FROM live_streaming_reaction
            WHERE live_streaming_id = $1 AND user_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(room)
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        raw.as_deref().map(parse_type).transpose()
    }

    async fn count_by_type(
        &self,
        room: RoomId,
        reaction_type: ReactionType,
    ) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM live_streaming_reaction
            WHERE live_streaming_id = $1 AND type = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(room)
        .bind(reaction_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}

/// SQLSTATE 23505 means a concurrent toggle inserted the row first
fn classify(err: sqlx::Error, room: RoomId, user: UserId) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::UniqueViolation { room, user };
        }
    }
    StoreError::Database(err)
}

fn parse_type(raw: &str) -> Result<ReactionType, StoreError> {
    raw.parse()
        .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))
}
