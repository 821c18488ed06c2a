//! Reaction storage seam and the in-memory store
//!
//! A store owns the `(room, user)` uniqueness and applies one toggle
//! atomically. `Ok` from `apply_toggle` means the transition is durable for
//! that store.

use crate::error::AppError;
use crate::models::{toggled, ReactionType, RoomId, UserId};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("reaction row for live streaming {room} and user {user} already exists")]
    UniqueViolation { room: RoomId, user: UserId },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => AppError::NotFound(what),
            err @ StoreError::UniqueViolation { .. } => AppError::Conflict(err.to_string()),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Apply `requested` to the caller's current reaction and return the new one.
    /// Fails with `NotFound` when the room or the user does not exist.
    async fn apply_toggle(
        &self,
        room: RoomId,
        user: UserId,
        requested: ReactionType,
    ) -> Result<Option<ReactionType>, StoreError>;

    /// Current, non-deleted reaction of `user` in `room`
    async fn find_active(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Option<ReactionType>, StoreError>;

    async fn count_by_type(
        &self,
        room: RoomId,
        reaction_type: ReactionType,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy)]
struct ReactionRow {
    reaction_type: ReactionType,
    deleted: bool,
}

impl ReactionRow {
    fn active(&self) -> Option<ReactionType> {
        (!self.deleted).then_some(self.reaction_type)
    }
}

/// Store used when no database is configured and in tests.
///
/// Each `(room, user)` transition runs under the map's entry lock.
#[derive(Debug, Default)]
pub struct InMemoryReactionStore {
    rooms: DashSet<RoomId>,
    users: DashSet<UserId>,
    reactions: DashMap<(RoomId, UserId), ReactionRow>,
}

impl InMemoryReactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_room(&self, room: RoomId) {
        self.rooms.insert(room);
    }

    pub fn register_user(&self, user: UserId) {
        self.users.insert(user);
    }

    fn ensure_exists(&self, room: RoomId, user: UserId) -> Result<(), StoreError> {
        if !self.rooms.contains(&room) {
            return Err(StoreError::NotFound(format!("live streaming {room}")));
        }
        if !self.users.contains(&user) {
            return Err(StoreError::NotFound(format!("user {user}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ReactionStore for InMemoryReactionStore {
    async fn apply_toggle(
        &self,
        room: RoomId,
        user: UserId,
        requested: ReactionType,
    ) -> Result<Option<ReactionType>, StoreError> {
        self.ensure_exists(room, user)?;

        let next = match self.reactions.entry((room, user)) {
            Entry::Occupied(mut occupied) => {
                let row = occupied.get_mut();
                match toggled(row.active(), requested) {
                    Some(reaction_type) => {
                        row.reaction_type = reaction_type;
                        row.deleted = false;
                        Some(reaction_type)
                    }
                    None => {
                        row.deleted = true;
                        None
                    }
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ReactionRow {
                    reaction_type: requested,
                    deleted: false,
                });
                Some(requested)
            }
        };

        Ok(next)
    }

    async fn find_active(
        &self,
        room: RoomId,
        user: UserId,
    ) -> Result<Option<ReactionType>, StoreError> {
        Ok(self
            .reactions
            .get(&(room, user))
            .and_then(|row| row.active()))
    }

    async fn count_by_type(
        &self,
        room: RoomId,
        reaction_type: ReactionType,
    ) -> Result<u64, StoreError> {
        let count = self
            .reactions
            .iter()
            .filter(|entry| {
                entry.key().0 == room && entry.value().active() == Some(reaction_type)
            })
            .count();
        Ok(count as u64)
    }
}
