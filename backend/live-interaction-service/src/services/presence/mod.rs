//! Viewer presence: exact session tracking for WebSocket clients and
//! TTL-based heartbeats for polling clients, sharing one streamer registry.

pub mod heartbeat_index;
pub mod session_index;
pub mod streamer_registry;

pub use heartbeat_index::HeartbeatIndex;
pub use session_index::PresenceIndex;
pub use streamer_registry::StreamerRegistry;
