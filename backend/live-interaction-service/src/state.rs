use crate::config::Config;
use crate::services::broadcast::{
    BroadcastScheduler, LikeCountDispatcher, TopicHub, ViewerCountBroadcaster,
};
use crate::services::interaction::InteractionService;
use crate::services::presence::{HeartbeatIndex, PresenceIndex, StreamerRegistry};
use crate::services::reaction::{
    reaction_event_channel, ReactionEventReceiver, ReactionStore, ReactionToggleEngine,
};
use crate::services::stream_status::{StreamStatusCache, StreamStatusLookup};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub interaction: Arc<InteractionService>,
    pub hub: Arc<TopicHub>,
    pub config: Arc<Config>,
}

/// Storage the service runs against (PostgreSQL or in-memory)
pub struct Backends {
    pub reactions: Arc<dyn ReactionStore>,
    pub statuses: Arc<dyn StreamStatusLookup>,
}

/// Wired state plus the pieces the broadcast tasks take ownership of
pub struct AppComponents {
    pub state: AppState,
    pub heartbeats: Arc<HeartbeatIndex>,
    pub broadcaster: ViewerCountBroadcaster,
    pub dispatcher: LikeCountDispatcher,
    pub events: ReactionEventReceiver,
}

impl AppState {
    pub fn assemble(config: Arc<Config>, backends: Backends) -> AppComponents {
        let streamers = Arc::new(StreamerRegistry::new());
        let presence = Arc::new(PresenceIndex::new(streamers.clone()));
        let heartbeats = Arc::new(HeartbeatIndex::new(
            config.presence.heartbeat_ttl,
            streamers,
        ));
        let hub = Arc::new(TopicHub::new(config.presence.topic_channel_capacity));

        let (publisher, events) = reaction_event_channel();
        let reactions = Arc::new(ReactionToggleEngine::new(
            backends.reactions.clone(),
            publisher,
        ));
        let statuses = Arc::new(StreamStatusCache::new(backends.statuses));

        let interaction = Arc::new(InteractionService::new(
            presence.clone(),
            heartbeats.clone(),
            reactions,
            statuses,
        ));

        let broadcaster = ViewerCountBroadcaster::new(hub.clone())
            .with_source(presence)
            .with_source(heartbeats.clone());
        let dispatcher = LikeCountDispatcher::new(backends.reactions, hub.clone());

        AppComponents {
            state: AppState {
                interaction,
                hub,
                config,
            },
            heartbeats,
            broadcaster,
            dispatcher,
            events,
        }
    }
}

impl AppComponents {
    /// Start the broadcast tasks; must run inside a tokio runtime
    pub fn start(self) -> (AppState, BroadcastScheduler) {
        let scheduler = BroadcastScheduler::spawn(
            self.broadcaster,
            self.heartbeats,
            self.dispatcher,
            self.events,
            &self.state.config.presence,
        );
        (self.state, scheduler)
    }
}
