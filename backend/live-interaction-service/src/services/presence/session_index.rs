//! Exact, session-based presence for WebSocket viewers
//!
//! Two maps kept in step:
//!
//! ```text
//! sessions: simpSessionId -> (room, viewer)
//! rooms:    room -> { viewer -> {simpSessionId, ...} }
//! ```
//!
//! The session map is the point of synchronization. Every mutation of a
//! session holds that session's shard lock while it updates the room side, so
//! a session is never visible in two rooms. Room entries remove themselves
//! once their last session leaves.
//!
//! Counts are raw sessions: one user with three tabs counts three. The
//! de-duplicated figure is available separately via `distinct_viewer_count`.

use super::streamer_registry::StreamerRegistry;
use crate::models::{RoomId, SessionId, UserId, ViewerKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct SessionBinding {
    room: RoomId,
    viewer: ViewerKey,
}

#[derive(Debug, Default)]
struct RoomSessions {
    viewers: HashMap<ViewerKey, HashSet<SessionId>>,
    session_count: usize,
}

impl RoomSessions {
    fn attach(&mut self, viewer: ViewerKey, session_id: &str) {
        if self
            .viewers
            .entry(viewer)
            .or_default()
            .insert(session_id.to_string())
        {
            self.session_count += 1;
        }
    }

    fn detach(&mut self, viewer: &ViewerKey, session_id: &str) {
        let Some(sessions) = self.viewers.get_mut(viewer) else {
            return;
        };
        if sessions.remove(session_id) {
            self.session_count -= 1;
        }
        if sessions.is_empty() {
            self.viewers.remove(viewer);
        }
    }

    fn is_empty(&self) -> bool {
        self.session_count == 0
    }
}

pub struct PresenceIndex {
    sessions: DashMap<SessionId, SessionBinding>,
    rooms: DashMap<RoomId, RoomSessions>,
    streamers: Arc<StreamerRegistry>,
}

impl PresenceIndex {
    pub fn new(streamers: Arc<StreamerRegistry>) -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
            streamers,
        }
    }

    /// Bind `session_id` to `room`.
    ///
    /// A session already bound to another room leaves that room first.
    /// Re-adding the same session to the same room does not change any count.
    /// Without a user id or client id the session id itself is the viewer identity.
    pub fn add_subscriber(
        &self,
        room: RoomId,
        session_id: &str,
        user_id: Option<UserId>,
        client_id: Option<&str>,
    ) {
        let viewer = ViewerKey::resolve(user_id, client_id)
            .unwrap_or_else(|| ViewerKey::Anonymous(session_id.to_string()));

        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.get().clone();
                if previous.room == room && previous.viewer == viewer {
                    return;
                }

                self.detach(previous.room, &previous.viewer, session_id);
                self.attach(room, viewer.clone(), session_id);
                occupied.insert(SessionBinding { room, viewer });

                if previous.room != room {
                    debug!(
                        session_id,
                        from = previous.room,
                        to = room,
                        "Session moved between livestreams"
                    );
                }
            }
            Entry::Vacant(vacant) => {
                self.attach(room, viewer.clone(), session_id);
                vacant.insert(SessionBinding { room, viewer });
                debug!(session_id, room, "Session subscribed to livestream");
            }
        }
    }

    /// Drop `session_id` from whichever room holds it.
    ///
    /// Unknown sessions are ignored: duplicate or late disconnect signals are normal.
    pub fn remove_subscriber(&self, session_id: &str) -> Option<RoomId> {
        let removed = self.sessions.remove_if(session_id, |_, binding| {
            self.detach(binding.room, &binding.viewer, session_id);
            true
        });

        match removed {
            Some((_, binding)) => {
                debug!(session_id, room = binding.room, "Session unsubscribed");
                Some(binding.room)
            }
            None => None,
        }
    }

    /// Number of sessions bound to `room` (not de-duplicated by viewer)
    pub fn subscriber_count(&self, room: RoomId) -> usize {
        self.rooms
            .get(&room)
            .map(|members| members.session_count)
            .unwrap_or(0)
    }

    /// Session count minus one when the registered streamer has at least one
    /// session in the room. Multiple streamer tabs still subtract only one.
    pub fn viewer_count_excluding_streamer(&self, room: RoomId) -> usize {
        let Some(members) = self.rooms.get(&room) else {
            return 0;
        };

        let streamer_present = self
            .streamers
            .streamer_of(room)
            .map(|user_id| members.viewers.contains_key(&ViewerKey::User(user_id)))
            .unwrap_or(false);

        if streamer_present {
            members.session_count.saturating_sub(1)
        } else {
            members.session_count
        }
    }

    /// Distinct viewer identities among the room's sessions
    pub fn distinct_viewer_count(&self, room: RoomId) -> usize {
        self.rooms
            .get(&room)
            .map(|members| members.viewers.len())
            .unwrap_or(0)
    }

    pub fn active_rooms(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| *entry.key()).collect()
    }

    pub fn session_room(&self, session_id: &str) -> Option<RoomId> {
        self.sessions.get(session_id).map(|binding| binding.room)
    }

    pub fn session_total(&self) -> usize {
        self.sessions.len()
    }

    pub fn register_streamer(&self, room: RoomId, user_id: UserId) {
        self.streamers.register(room, user_id);
    }

    pub fn unregister_streamer(&self, room: RoomId) {
        self.streamers.unregister(room);
    }

    fn attach(&self, room: RoomId, viewer: ViewerKey, session_id: &str) {
        self.rooms.entry(room).or_default().attach(viewer, session_id);
    }

    fn detach(&self, room: RoomId, viewer: &ViewerKey, session_id: &str) {
        let now_empty = match self.rooms.get_mut(&room) {
            Some(mut members) => {
                members.detach(viewer, session_id);
                members.is_empty()
            }
            None => return,
        };

        // Re-checked under the shard lock: a concurrent attach may have refilled it
        if now_empty {
            self.rooms.remove_if(&room, |_, members| members.is_empty());
        }
    }
}
