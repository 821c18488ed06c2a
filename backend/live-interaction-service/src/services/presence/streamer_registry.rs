//! Room -> broadcaster binding
//!
//! Shared by the session index and the heartbeat index so both exclude the
//! same streamer identity. Never clone the map itself, clone the `Arc`.

use crate::models::{RoomId, UserId, ViewerKey};
use dashmap::DashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct StreamerRegistry {
    streamers: DashMap<RoomId, UserId>,
}

impl StreamerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `room` to its broadcaster. A second call replaces the binding.
    pub fn register(&self, room: RoomId, user_id: UserId) {
        if let Some(previous) = self.streamers.insert(room, user_id) {
            if previous != user_id {
                debug!(room, previous, user_id, "Streamer binding replaced");
            }
        }
    }

    pub fn unregister(&self, room: RoomId) -> Option<UserId> {
        self.streamers.remove(&room).map(|(_, user_id)| user_id)
    }

    pub fn streamer_of(&self, room: RoomId) -> Option<UserId> {
        self.streamers.get(&room).map(|entry| *entry.value())
    }

    /// True when `viewer` is the registered broadcaster of `room`
    pub fn is_streamer(&self, room: RoomId, viewer: &ViewerKey) -> bool {
        self.streamer_of(room)
            .map(|user_id| viewer.is_user(user_id))
            .unwrap_or(false)
    }
}
