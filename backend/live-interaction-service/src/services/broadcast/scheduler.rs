//! Periodic viewer-count broadcasts and event-driven like-count broadcasts
//!
//! Three tasks share one shutdown signal:
//! - viewer-count ticker: every interval, publish each active room's count
//! - heartbeat sweeper: drop expired heartbeats to bound memory
//! - like-count dispatcher: re-read and publish the LIKE count after a committed toggle

use super::sink::{BroadcastSink, PublishError};
use crate::config::PresenceConfig;
use crate::metrics;
use crate::models::{ReactionType, RoomId, Topic};
use crate::services::presence::{HeartbeatIndex, PresenceIndex};
use crate::services::reaction::{ReactionEvent, ReactionEventReceiver, ReactionStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_COALESCED_EVENTS: usize = 1024;

/// Anything the ticker can read a per-room viewer count from
pub trait ViewerCountSource: Send + Sync {
    /// Metric label
    fn name(&self) -> &'static str;

    fn topic(&self, room: RoomId) -> Topic;

    fn active_rooms(&self) -> Vec<RoomId>;

    /// Count shown to the audience (streamer excluded)
    fn audience_count(&self, room: RoomId) -> u64;
}

impl ViewerCountSource for PresenceIndex {
    fn name(&self) -> &'static str {
        "websocket"
    }

    fn topic(&self, room: RoomId) -> Topic {
        Topic::ViewerCount(room)
    }

    fn active_rooms(&self) -> Vec<RoomId> {
        PresenceIndex::active_rooms(self)
    }

    fn audience_count(&self, room: RoomId) -> u64 {
        self.viewer_count_excluding_streamer(room) as u64
    }
}

impl ViewerCountSource for HeartbeatIndex {
    fn name(&self) -> &'static str {
        "polling"
    }

    fn topic(&self, room: RoomId) -> Topic {
        Topic::PollingViewerCount(room)
    }

    fn active_rooms(&self) -> Vec<RoomId> {
        HeartbeatIndex::active_rooms(self)
    }

    fn audience_count(&self, room: RoomId) -> u64 {
        self.viewer_count_excluding_streamer(room) as u64
    }
}

/// Publish one count frame. Frames without listeners are counted as skipped;
/// real failures are logged, counted and dropped.
pub fn publish_count(sink: &dyn BroadcastSink, topic: Topic, count: u64) -> bool {
    match sink.publish(&topic, count) {
        Ok(receivers) => {
            metrics::record_broadcast(topic.kind());
            debug!(topic = %topic, count, receivers, "Count broadcast");
            true
        }
        Err(PublishError::NoSubscribers(_)) => {
            metrics::record_broadcast_skipped(topic.kind());
            debug!(topic = %topic, count, "Count not delivered: no subscribers");
            false
        }
        Err(err) => {
            metrics::record_broadcast_failure(topic.kind(), err.reason());
            warn!(topic = %topic, count, error = %err, "Count broadcast failed");
            false
        }
    }
}

struct TrackedSource {
    source: Arc<dyn ViewerCountSource>,
    /// Rooms published on the previous tick
    previous: HashSet<RoomId>,
}

pub struct ViewerCountBroadcaster {
    sources: Vec<TrackedSource>,
    sink: Arc<dyn BroadcastSink>,
}

impl ViewerCountBroadcaster {
    pub fn new(sink: Arc<dyn BroadcastSink>) -> Self {
        Self {
            sources: Vec::new(),
            sink,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ViewerCountSource>) -> Self {
        self.sources.push(TrackedSource {
            source,
            previous: HashSet::new(),
        });
        self
    }

    /// Publish the count of every active room, plus a single `0` for rooms
    /// that were active on the previous tick and are not anymore.
    /// Returns the number of frames attempted.
    pub fn tick(&mut self) -> usize {
        let mut attempted = 0;

        for tracked in &mut self.sources {
            let source = &tracked.source;
            let active: HashSet<RoomId> = source.active_rooms().into_iter().collect();
            metrics::set_active_rooms(source.name(), active.len());

            for &room in &active {
                publish_count(&*self.sink, source.topic(room), source.audience_count(room));
                attempted += 1;
            }

            for &room in tracked.previous.difference(&active) {
                publish_count(&*self.sink, source.topic(room), 0);
                attempted += 1;
            }

            tracked.previous = active;
        }

        // Like-count topics are only published on reactions, so a room that
        // emptied out would otherwise keep its channel forever
        self.sink.prune();

        attempted
    }
}

/// Turns committed reaction events into like-count frames
pub struct LikeCountDispatcher {
    store: Arc<dyn ReactionStore>,
    sink: Arc<dyn BroadcastSink>,
}

impl LikeCountDispatcher {
    pub fn new(store: Arc<dyn ReactionStore>, sink: Arc<dyn BroadcastSink>) -> Self {
        Self { store, sink }
    }

    pub async fn dispatch(&self, room: RoomId) -> bool {
        match self.store.count_by_type(room, ReactionType::Like).await {
            Ok(count) => publish_count(&*self.sink, Topic::LikeCount(room), count),
            Err(err) => {
                warn!(room, error = %err, "Failed to read like count for broadcast");
                false
            }
        }
    }

    pub async fn run(
        self,
        mut events: ReactionEventReceiver,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                event = events.recv() => match event {
                    Some(event) => {
                        for room in coalesce(event, &mut events) {
                            self.dispatch(room).await;
                        }
                    }
                    None => break,
                },
            }
        }
        info!("Like count dispatcher stopped");
    }
}

/// Fold the events already queued behind `first` into one entry per room,
/// in arrival order. At most `MAX_COALESCED_EVENTS` are drained per round.
fn coalesce(first: ReactionEvent, events: &mut ReactionEventReceiver) -> Vec<RoomId> {
    let mut seen = HashSet::from([first.room]);
    let mut rooms = vec![first.room];

    for _ in 1..MAX_COALESCED_EVENTS {
        match events.try_recv() {
            Ok(event) => {
                if seen.insert(event.room) {
                    rooms.push(event.room);
                }
            }
            Err(_) => break,
        }
    }

    rooms
}

/// Handles of the running broadcast tasks
pub struct BroadcastScheduler {
    shutdown: broadcast::Sender<()>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl BroadcastScheduler {
    pub fn spawn(
        broadcaster: ViewerCountBroadcaster,
        heartbeats: Arc<HeartbeatIndex>,
        dispatcher: LikeCountDispatcher,
        events: ReactionEventReceiver,
        config: &PresenceConfig,
    ) -> Self {
        let (shutdown, _) = broadcast::channel(1);

        let viewer_counts = tokio::spawn(run_viewer_counts(
            broadcaster,
            config.broadcast_interval,
            shutdown.subscribe(),
        ));
        let sweeper = tokio::spawn(run_heartbeat_sweeper(
            heartbeats,
            config.heartbeat_sweep_interval,
            shutdown.subscribe(),
        ));
        let likes = tokio::spawn(dispatcher.run(events, shutdown.subscribe()));

        info!(
            broadcast_interval_ms = config.broadcast_interval.as_millis() as u64,
            sweep_interval_secs = config.heartbeat_sweep_interval.as_secs(),
            "Broadcast scheduler started"
        );

        Self {
            shutdown,
            handles: vec![
                ("viewer count broadcaster", viewer_counts),
                ("heartbeat sweeper", sweeper),
                ("like count dispatcher", likes),
            ],
        }
    }

    pub async fn shutdown(self) {
        info!("Shutting down broadcast scheduler...");
        let _ = self.shutdown.send(());

        for (name, mut handle) in self.handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => info!("{} shut down gracefully", name),
                Ok(Err(_)) => info!("{} aborted", name),
                Err(_) => {
                    warn!("{} did not shut down within timeout", name);
                    handle.abort();
                }
            }
        }
    }
}

async fn run_viewer_counts(
    mut broadcaster: ViewerCountBroadcaster,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                broadcaster.tick();
            }
        }
    }
    info!("Viewer count broadcaster stopped");
}

async fn run_heartbeat_sweeper(
    heartbeats: Arc<HeartbeatIndex>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = ticker.tick() => {
                let removed = heartbeats.cleanup_expired();
                metrics::record_heartbeats_swept(removed);
            }
        }
    }
    info!("Heartbeat sweeper stopped");
}
