//! Room-scoped count publishing
//!
//! `BroadcastSink` is the single seam between the counting engine and whatever
//! fans frames out to clients. `TopicHub` is the in-process implementation:
//! one `tokio::sync::broadcast` channel per topic string, created on first
//! subscribe and dropped once nobody listens.

use crate::models::Topic;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("no subscribers on {0}")]
    NoSubscribers(String),

    #[error("failed to encode payload: {0}")]
    Encode(String),
}

impl PublishError {
    /// Metric label
    pub fn reason(&self) -> &'static str {
        match self {
            PublishError::NoSubscribers(_) => "no_subscribers",
            PublishError::Encode(_) => "encode",
        }
    }
}

pub trait BroadcastSink: Send + Sync {
    /// Deliver `count` to every current subscriber of `topic`.
    /// Returns how many subscribers received it.
    fn publish(&self, topic: &Topic, count: u64) -> Result<usize, PublishError>;

    /// Release topics nobody listens to anymore. Returns how many were dropped.
    fn prune(&self) -> usize {
        0
    }
}

pub struct TopicHub {
    channels: DashMap<String, broadcast::Sender<String>>,
    capacity: usize,
}

impl TopicHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Receive every frame published to `topic` from now on.
    /// Frames are the JSON encoding of the count.
    pub fn subscribe(&self, topic: &Topic) -> broadcast::Receiver<String> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.channels
            .get(&topic.to_string())
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.channels.len()
    }
}

impl BroadcastSink for TopicHub {
    fn publish(&self, topic: &Topic, count: u64) -> Result<usize, PublishError> {
        let key = topic.to_string();
        let payload =
            serde_json::to_string(&count).map_err(|e| PublishError::Encode(e.to_string()))?;

        let delivered = match self.channels.get(&key) {
            Some(sender) => sender.send(payload).ok(),
            None => None,
        };

        match delivered {
            Some(receivers) => Ok(receivers),
            None => {
                if self
                    .channels
                    .remove_if(&key, |_, sender| sender.receiver_count() == 0)
                    .is_some()
                {
                    debug!(topic = %key, "Dropped topic without subscribers");
                }
                Err(PublishError::NoSubscribers(key))
            }
        }
    }

    fn prune(&self) -> usize {
        let before = self.channels.len();
        self.channels.retain(|_, sender| sender.receiver_count() > 0);
        let dropped = before.saturating_sub(self.channels.len());
        if dropped > 0 {
            debug!(dropped, "Pruned topics without subscribers");
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let hub = TopicHub::new(8);
        let mut first = hub.subscribe(&Topic::ViewerCount(1));
        let mut second = hub.subscribe(&Topic::ViewerCount(1));

        assert_eq!(hub.publish(&Topic::ViewerCount(1), 17), Ok(2));
        assert_eq!(first.recv().await.unwrap(), "17");
        assert_eq!(second.recv().await.unwrap(), "17");
    }

    #[tokio::test]
    async fn test_topics_are_room_scoped() {
        let hub = TopicHub::new(8);
        let mut room_one = hub.subscribe(&Topic::LikeCount(1));
        let _room_two = hub.subscribe(&Topic::LikeCount(2));

        hub.publish(&Topic::LikeCount(2), 3).unwrap();
        hub.publish(&Topic::LikeCount(1), 9).unwrap();

        assert_eq!(room_one.recv().await.unwrap(), "9");
    }

    #[test]
    fn test_no_subscribers_is_an_error() {
        let hub = TopicHub::new(8);

        let err = hub.publish(&Topic::ViewerCount(4), 0).unwrap_err();
        assert_eq!(err.reason(), "no_subscribers");
    }

    #[test]
    fn test_abandoned_topic_is_dropped() {
        let hub = TopicHub::new(8);
        let receiver = hub.subscribe(&Topic::ViewerCount(4));
        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.subscriber_count(&Topic::ViewerCount(4)), 1);

        drop(receiver);

        assert!(hub.publish(&Topic::ViewerCount(4), 1).is_err());
        assert_eq!(hub.topic_count(), 0);
    }

    #[test]
    fn test_prune_drops_only_abandoned_topics() {
        let hub = TopicHub::new(8);
        let likes = hub.subscribe(&Topic::LikeCount(1));
        let _viewers = hub.subscribe(&Topic::ViewerCount(1));
        assert_eq!(hub.topic_count(), 2);

        drop(likes);

        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.topic_count(), 1);
        assert_eq!(hub.subscriber_count(&Topic::ViewerCount(1)), 1);
    }
}
