//! Count fan-out: the broadcast sink and the tasks that feed it.

pub mod scheduler;
pub mod sink;

pub use scheduler::{
    publish_count, BroadcastScheduler, LikeCountDispatcher, ViewerCountBroadcaster,
    ViewerCountSource,
};
pub use sink::{BroadcastSink, PublishError, TopicHub};
