use super::events::{ReactionEvent, ReactionEventPublisher};
use super::store::{ReactionStore, StoreError};
use crate::error::Result;
use crate::metrics;
use crate::models::{ReactionToggleResult, ReactionType, RoomId, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// A lost insert race is retried once; the retry then sees the winner's row.
const MAX_ATTEMPTS: u32 = 2;

/// Like/dislike toggling per `(room, user)`.
///
/// A like-count event is emitted only when the committed result is LIKE.
/// Removals and LIKE -> DISLIKE emit nothing.
pub struct ReactionToggleEngine {
    store: Arc<dyn ReactionStore>,
    events: ReactionEventPublisher,
}

impl ReactionToggleEngine {
    pub fn new(store: Arc<dyn ReactionStore>, events: ReactionEventPublisher) -> Self {
        Self { store, events }
    }

    pub async fn toggle(
        &self,
        room: RoomId,
        user: UserId,
        requested: ReactionType,
    ) -> Result<ReactionToggleResult> {
        let mut attempt = 0;
        let next = loop {
            attempt += 1;
            match self.store.apply_toggle(room, user, requested).await {
                Ok(next) => break next,
                Err(StoreError::UniqueViolation { .. }) if attempt < MAX_ATTEMPTS => {
                    metrics::record_reaction_retry();
                    debug!(room, user, attempt, "Reaction insert raced, retrying");
                }
                Err(err) => {
                    if matches!(err, StoreError::UniqueViolation { .. }) {
                        warn!(room, user, "Reaction toggle still conflicting after retry");
                    }
                    return Err(err.into());
                }
            }
        };

        metrics::record_reaction_toggle(next.map(|t| t.as_str()).unwrap_or("NONE"));

        // apply_toggle returned Ok: the transition is committed
        if next == Some(ReactionType::Like) {
            self.events.publish(ReactionEvent {
                room,
                reaction_type: ReactionType::Like,
            });
        }

        Ok(ReactionToggleResult::new(next))
    }

    pub async fn like_count(&self, room: RoomId) -> Result<u64> {
        Ok(self.store.count_by_type(room, ReactionType::Like).await?)
    }

    /// Anonymous callers never have a reaction
    pub async fn user_reaction(
        &self,
        room: RoomId,
        user: Option<UserId>,
    ) -> Result<Option<ReactionType>> {
        match user {
            Some(user) => Ok(self.store.find_active(room, user).await?),
            None => Ok(None),
        }
    }
}
