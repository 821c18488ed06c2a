//! Presence, reaction and broadcast engine
//!
//! - `presence`: session index (WebSocket) and heartbeat index (polling)
//! - `reaction`: like/dislike toggling and post-commit events
//! - `broadcast`: topic hub and the periodic/event-driven publishers
//! - `stream_status`: broadcast lifecycle, status cache, chat gate
//! - `interaction`: the facade the transport layer calls

pub mod broadcast;
pub mod interaction;
pub mod presence;
pub mod reaction;
pub mod stream_status;

pub use interaction::InteractionService;
