//! Post-commit reaction events
//!
//! The toggle engine writes here only after its store reported a committed
//! transition, so a rolled-back toggle never reaches the like-count dispatcher.
//! Sending never blocks the caller.

use crate::models::{ReactionType, RoomId};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionEvent {
    pub room: RoomId,
    pub reaction_type: ReactionType,
}

pub type ReactionEventReceiver = mpsc::UnboundedReceiver<ReactionEvent>;

#[derive(Debug, Clone)]
pub struct ReactionEventPublisher {
    tx: mpsc::UnboundedSender<ReactionEvent>,
}

impl ReactionEventPublisher {
    pub fn publish(&self, event: ReactionEvent) {
        if self.tx.send(event).is_err() {
            warn!(room = event.room, "Reaction event dropped: dispatcher is gone");
        }
    }
}

pub fn reaction_event_channel() -> (ReactionEventPublisher, ReactionEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReactionEventPublisher { tx }, rx)
}
