//! Entry points used by the transport layer
//!
//! Every inbound signal (WebSocket subscribe/disconnect, HTTP poll, reaction
//! request, broadcast start/end) lands on exactly one method here.

use super::presence::{HeartbeatIndex, PresenceIndex};
use super::reaction::ReactionToggleEngine;
use super::stream_status::{ChatGateway, StreamStatusCache};
use crate::error::{AppError, Result};
use crate::models::{LiveStats, ReactionToggleResult, ReactionType, RoomId, StreamStatus, UserId};
use std::sync::Arc;
use tracing::info;

pub struct InteractionService {
    presence: Arc<PresenceIndex>,
    heartbeats: Arc<HeartbeatIndex>,
    reactions: Arc<ReactionToggleEngine>,
    statuses: Arc<StreamStatusCache>,
    chat: ChatGateway,
}

impl InteractionService {
    pub fn new(
        presence: Arc<PresenceIndex>,
        heartbeats: Arc<HeartbeatIndex>,
        reactions: Arc<ReactionToggleEngine>,
        statuses: Arc<StreamStatusCache>,
    ) -> Self {
        let chat = ChatGateway::new(statuses.clone());
        Self {
            presence,
            heartbeats,
            reactions,
            statuses,
            chat,
        }
    }

    pub fn presence(&self) -> &Arc<PresenceIndex> {
        &self.presence
    }

    pub fn heartbeats(&self) -> &Arc<HeartbeatIndex> {
        &self.heartbeats
    }

    /// A WebSocket session subscribed to a room's topics
    pub fn on_subscribe(
        &self,
        room: RoomId,
        session_id: &str,
        user_id: Option<UserId>,
        client_id: Option<&str>,
    ) {
        self.presence
            .add_subscriber(room, session_id, user_id, client_id);
    }

    pub fn on_disconnect(&self, session_id: &str) -> Option<RoomId> {
        self.presence.remove_subscriber(session_id)
    }

    /// Record the poller's heartbeat and return the room's current figures
    pub async fn on_poll(
        &self,
        room: RoomId,
        client_id: &str,
        user_id: Option<UserId>,
    ) -> Result<LiveStats> {
        self.heartbeats.record_heartbeat(room, client_id, user_id);

        let viewer_count = self.heartbeats.viewer_count_excluding_streamer(room) as u64;
        let like_count = self.reactions.like_count(room).await?;

        Ok(LiveStats {
            viewer_count,
            like_count,
        })
    }

    pub async fn on_reaction_request(
        &self,
        room: RoomId,
        user: UserId,
        requested: ReactionType,
    ) -> Result<ReactionToggleResult> {
        self.reactions.toggle(room, user, requested).await
    }

    pub async fn like_count(&self, room: RoomId) -> Result<u64> {
        self.reactions.like_count(room).await
    }

    pub async fn user_reaction(
        &self,
        room: RoomId,
        user: Option<UserId>,
    ) -> Result<Option<ReactionType>> {
        self.reactions.user_reaction(room, user).await
    }

    /// Only a SCHEDULED room can go live
    pub async fn on_stream_start(&self, room: RoomId, streamer: UserId) -> Result<()> {
        let lookup = self.statuses.lookup();

        match lookup.find_status(room).await? {
            None => return Err(AppError::NotFound(format!("live streaming {room}"))),
            Some(StreamStatus::Ended) => {
                return Err(AppError::BadRequest(format!(
                    "live streaming {room} has already ended"
                )))
            }
            // The streamer binding is set once; a second start must not rebind it
            Some(StreamStatus::Live) => {
                return Err(AppError::Conflict(format!(
                    "live streaming {room} is already live"
                )))
            }
            Some(StreamStatus::Scheduled) => {}
        }

        if !lookup.mark_live(room, streamer).await? {
            return Err(AppError::NotFound(format!("live streaming {room}")));
        }

        self.statuses.put(room, StreamStatus::Live);
        self.presence.register_streamer(room, streamer);

        info!(room, streamer, "Live streaming started");
        Ok(())
    }

    /// Only the broadcaster that started the room may end it
    pub async fn on_stream_end(&self, room: RoomId, user: UserId) -> Result<()> {
        let lookup = self.statuses.lookup();

        if lookup.find_status(room).await?.is_none() {
            return Err(AppError::NotFound(format!("live streaming {room}")));
        }
        if lookup.find_streamer(room).await? != Some(user) {
            return Err(AppError::Forbidden(format!(
                "user {user} does not own live streaming {room}"
            )));
        }

        if !lookup.mark_ended(room).await? {
            return Err(AppError::NotFound(format!("live streaming {room}")));
        }

        self.statuses.put(room, StreamStatus::Ended);
        self.presence.unregister_streamer(room);
        let purged = self.heartbeats.end_live_streaming(room);

        info!(room, purged, "Live streaming ended");
        Ok(())
    }

    pub async fn ensure_chat_allowed(&self, room: RoomId) -> Result<()> {
        self.chat.ensure_chat_allowed(room).await
    }
}
