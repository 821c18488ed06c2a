//! Broadcast lifecycle lookups, the status cache and the chat gate
//!
//! Chat traffic asks "is this room live?" far more often than the status
//! changes, so the answer is cached with a lifetime that depends on the status:
//! LIVE 12h, SCHEDULED 1h, ENDED 30min. Lifecycle transitions overwrite the
//! cached value after they commit.

use crate::error::{AppError, Result};
use crate::models::{RoomId, StreamStatus, UserId};
use crate::services::reaction::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[async_trait]
pub trait StreamStatusLookup: Send + Sync {
    async fn find_status(&self, room: RoomId) -> std::result::Result<Option<StreamStatus>, StoreError>;

    async fn find_streamer(&self, room: RoomId) -> std::result::Result<Option<UserId>, StoreError>;

    /// Returns `false` when the room does not exist
    async fn mark_live(&self, room: RoomId, streamer: UserId) -> std::result::Result<bool, StoreError>;

    /// Returns `false` when the room does not exist
    async fn mark_ended(&self, room: RoomId) -> std::result::Result<bool, StoreError>;
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Clone)]
pub struct PgStreamStatusLookup {
    pool: PgPool,
}

impl PgStreamStatusLookup {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamStatusLookup for PgStreamStatusLookup {
    async fn find_status(&self, room: RoomId) -> std::result::Result<Option<StreamStatus>, StoreError> {
        let raw: Option<String> =
            sqlx::query_scalar("SELECT status FROM live_streaming WHERE id = $1")
                .bind(room)
                .fetch_optional(&self.pool)
                .await?;

        raw.map(|raw| {
            raw.parse()
                .map_err(|e: String| StoreError::Database(sqlx::Error::Decode(e.into())))
        })
        .transpose()
    }

    async fn find_streamer(&self, room: RoomId) -> std::result::Result<Option<UserId>, StoreError> {
        let streamer: Option<Option<i64>> =
            sqlx::query_scalar("SELECT streamer_id FROM live_streaming WHERE id = $1")
                .bind(room)
                .fetch_optional(&self.pool)
                .await?;

        Ok(streamer.flatten())
    }

    async fn mark_live(&self, room: RoomId, streamer: UserId) -> std::result::Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE live_streaming
            SET status = 'LIVE', streamer_id = $2, started_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(room)
        .bind(streamer)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_ended(&self, room: RoomId) -> std::result::Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE live_streaming
            SET status = 'ENDED', ended_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(room)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryStreamStatusLookup {
    rooms: DashMap<RoomId, (StreamStatus, Option<UserId>)>,
    status_reads: AtomicUsize,
}

impl InMemoryStreamStatusLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, room: RoomId, status: StreamStatus) {
        self.rooms.insert(room, (status, None));
    }

    /// Number of `find_status` calls served
    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StreamStatusLookup for InMemoryStreamStatusLookup {
    async fn find_status(&self, room: RoomId) -> std::result::Result<Option<StreamStatus>, StoreError> {
        self.status_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.rooms.get(&room).map(|entry| entry.0))
    }

    async fn find_streamer(&self, room: RoomId) -> std::result::Result<Option<UserId>, StoreError> {
        Ok(self.rooms.get(&room).and_then(|entry| entry.1))
    }

    async fn mark_live(&self, room: RoomId, streamer: UserId) -> std::result::Result<bool, StoreError> {
        Ok(self
            .rooms
            .get_mut(&room)
            .map(|mut entry| *entry = (StreamStatus::Live, Some(streamer)))
            .is_some())
    }

    async fn mark_ended(&self, room: RoomId) -> std::result::Result<bool, StoreError> {
        Ok(self
            .rooms
            .get_mut(&room)
            .map(|mut entry| entry.0 = StreamStatus::Ended)
            .is_some())
    }
}

// =============================================================================
// Cache
// =============================================================================

fn ttl_for(status: StreamStatus) -> Duration {
    match status {
        StreamStatus::Live => Duration::from_secs(12 * 60 * 60),
        StreamStatus::Scheduled => Duration::from_secs(60 * 60),
        StreamStatus::Ended => Duration::from_secs(30 * 60),
    }
}

struct CachedStatus {
    status: StreamStatus,
    cached_at: Instant,
}

impl CachedStatus {
    fn is_fresh(&self) -> bool {
        self.cached_at.elapsed() < ttl_for(self.status)
    }
}

pub struct StreamStatusCache {
    lookup: Arc<dyn StreamStatusLookup>,
    entries: DashMap<RoomId, CachedStatus>,
}

impl StreamStatusCache {
    pub fn new(lookup: Arc<dyn StreamStatusLookup>) -> Self {
        Self {
            lookup,
            entries: DashMap::new(),
        }
    }

    pub fn lookup(&self) -> &Arc<dyn StreamStatusLookup> {
        &self.lookup
    }

    /// Cached status, loading it on a miss. Unknown rooms are not cached.
    pub async fn status_of(&self, room: RoomId) -> std::result::Result<Option<StreamStatus>, StoreError> {
        if let Some(cached) = self.entries.get(&room) {
            if cached.is_fresh() {
                return Ok(Some(cached.status));
            }
        }

        let status = self.lookup.find_status(room).await?;
        match status {
            Some(status) => self.put(room, status),
            None => {
                self.entries.remove(&room);
            }
        }
        Ok(status)
    }

    pub fn put(&self, room: RoomId, status: StreamStatus) {
        debug!(room, status = status.as_str(), "Caching stream status");
        self.entries.insert(
            room,
            CachedStatus {
                status,
                cached_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, room: RoomId) {
        self.entries.remove(&room);
    }
}

/// Admission check for chat messages
pub struct ChatGateway {
    cache: Arc<StreamStatusCache>,
}

impl ChatGateway {
    pub fn new(cache: Arc<StreamStatusCache>) -> Self {
        Self { cache }
    }

    pub async fn ensure_chat_allowed(&self, room: RoomId) -> Result<()> {
        match self.cache.status_of(room).await? {
            Some(StreamStatus::Live) => Ok(()),
            Some(status) => Err(AppError::BadRequest(format!(
                "chat is not allowed while live streaming {room} is {}",
                status.as_str()
            ))),
            None => Err(AppError::NotFound(format!("live streaming {room}"))),
        }
    }
}
