//! Like/dislike toggling backed by a reaction store, with post-commit
//! like-count events.

pub mod events;
pub mod repository;
pub mod store;
pub mod toggle;

pub use events::{reaction_event_channel, ReactionEvent, ReactionEventPublisher, ReactionEventReceiver};
pub use repository::PgReactionStore;
pub use store::{InMemoryReactionStore, ReactionStore, StoreError};
pub use toggle::ReactionToggleEngine;
