//! TTL-based presence for HTTP polling viewers
//!
//! Polling clients never say goodbye, so a viewer counts only while its latest
//! heartbeat is younger than the TTL. Expiry is evaluated at read time; the
//! periodic `cleanup_expired` sweep exists to bound memory, not for correctness.

use super::streamer_registry::StreamerRegistry;
use crate::models::{RoomId, UserId, ViewerKey};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub struct HeartbeatIndex {
    /// room -> viewer -> last seen
    rooms: DashMap<RoomId, HashMap<ViewerKey, Instant>>,
    ttl: Duration,
    streamers: Arc<StreamerRegistry>,
}

impl HeartbeatIndex {
    pub fn new(ttl: Duration, streamers: Arc<StreamerRegistry>) -> Self {
        Self {
            rooms: DashMap::new(),
            ttl,
            streamers,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Refresh `lastSeen` for the caller's viewer key in `room`.
    ///
    /// The room is not validated. Returns `false` when the caller carries no
    /// identity at all (no user id, empty client id) and nothing was recorded.
    pub fn record_heartbeat(&self, room: RoomId, client_id: &str, user_id: Option<UserId>) -> bool {
        let Some(viewer) = ViewerKey::resolve(user_id, Some(client_id)) else {
            debug!(room, "Heartbeat without viewer identity ignored");
            return false;
        };

        self.rooms
            .entry(room)
            .or_default()
            .insert(viewer, Instant::now());
        true
    }

    /// Live viewer keys in `room`, streamer included
    pub fn viewer_count(&self, room: RoomId) -> usize {
        self.rooms
            .get(&room)
            .map(|viewers| {
                viewers
                    .values()
                    .filter(|seen| self.is_live(**seen))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn viewer_count_excluding_streamer(&self, room: RoomId) -> usize {
        let Some(viewers) = self.rooms.get(&room) else {
            return 0;
        };

        let streamer = self.streamers.streamer_of(room).map(ViewerKey::User);

        viewers
            .iter()
            .filter(|(viewer, seen)| self.is_live(**seen) && Some(*viewer) != streamer.as_ref())
            .count()
    }

    /// Rooms holding at least one unexpired heartbeat
    pub fn active_rooms(&self) -> Vec<RoomId> {
        self.rooms
            .iter()
            .filter(|entry| entry.value().values().any(|seen| self.is_live(*seen)))
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn register_streamer(&self, room: RoomId, user_id: UserId) {
        self.streamers.register(room, user_id);
    }

    /// Forget every heartbeat and the streamer binding of an ended broadcast.
    /// Returns the number of purged heartbeat entries.
    pub fn end_live_streaming(&self, room: RoomId) -> usize {
        let purged = self
            .rooms
            .remove(&room)
            .map(|(_, viewers)| viewers.len())
            .unwrap_or(0);
        self.streamers.unregister(room);

        info!(room, purged, "Heartbeats purged for ended livestream");
        purged
    }

    /// Drop expired entries across all rooms and rooms left empty.
    /// Returns the number of removed entries.
    pub fn cleanup_expired(&self) -> usize {
        let mut removed = 0;

        self.rooms.retain(|_, viewers| {
            let before = viewers.len();
            viewers.retain(|_, seen| self.is_live(*seen));
            removed += before - viewers.len();
            !viewers.is_empty()
        });

        if removed > 0 {
            debug!(removed, "Expired heartbeats swept");
        }
        removed
    }

    /// Tracked rooms, expired or not
    pub fn tracked_rooms(&self) -> usize {
        self.rooms.len()
    }

    fn is_live(&self, seen: Instant) -> bool {
        seen.elapsed() <= self.ttl
    }
}
