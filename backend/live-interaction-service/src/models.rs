//! Domain types shared by the presence, heartbeat and reaction components.
//!
//! These are value types only. None of them owns storage; the indices in
//! `services::presence` and the stores in `services::reaction` decide where
//! they live.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Live broadcast identifier (one room per broadcast)
pub type RoomId = i64;

/// Authenticated user identifier
pub type UserId = i64;

/// One physical WebSocket connection
pub type SessionId = String;

/// Anonymous client identifier handed out by the HTTP session layer
pub type ClientId = String;

// =============================================================================
// Viewer identity
// =============================================================================

/// De-duplication identity for a single human across tabs and devices.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewerKey {
    User(UserId),
    Anonymous(ClientId),
}

impl ViewerKey {
    /// User id takes precedence over client id. Returns `None` when neither is known.
    pub fn resolve(user_id: Option<UserId>, client_id: Option<&str>) -> Option<Self> {
        match (user_id, client_id) {
            (Some(user_id), _) => Some(Self::User(user_id)),
            (None, Some(client_id)) if !client_id.is_empty() => {
                Some(Self::Anonymous(client_id.to_string()))
            }
            _ => None,
        }
    }

    pub fn is_user(&self, user_id: UserId) -> bool {
        matches!(self, Self::User(id) if *id == user_id)
    }
}

impl fmt::Display for ViewerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Anonymous(client_id) => write!(f, "client:{client_id}"),
        }
    }
}

// =============================================================================
// Reactions
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReactionType {
    Like,
    Dislike,
}

impl ReactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "LIKE",
            Self::Dislike => "DISLIKE",
        }
    }
}

impl FromStr for ReactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LIKE" => Ok(Self::Like),
            "DISLIKE" => Ok(Self::Dislike),
            other => Err(format!("unknown reaction type: {other}")),
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toggle state machine over {none, LIKE, DISLIKE}.
///
/// - none -> requested
/// - requested -> none (same type toggles off)
/// - other -> requested (type is overwritten)
pub fn toggled(current: Option<ReactionType>, requested: ReactionType) -> Option<ReactionType> {
    match current {
        Some(existing) if existing == requested => None,
        _ => Some(requested),
    }
}

/// Result handed back to the caller of a toggle for immediate UI feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionToggleResult {
    pub reaction_type: Option<ReactionType>,
}

impl ReactionToggleResult {
    pub fn new(reaction_type: Option<ReactionType>) -> Self {
        Self { reaction_type }
    }

    pub fn is_liked(&self) -> bool {
        self.reaction_type == Some(ReactionType::Like)
    }

    pub fn is_disliked(&self) -> bool {
        self.reaction_type == Some(ReactionType::Dislike)
    }
}

// =============================================================================
// Broadcast lifecycle
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamStatus {
    Scheduled,
    Live,
    Ended,
}

impl StreamStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Live => "LIVE",
            Self::Ended => "ENDED",
        }
    }
}

impl FromStr for StreamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(Self::Scheduled),
            "LIVE" => Ok(Self::Live),
            "ENDED" => Ok(Self::Ended),
            other => Err(format!("unknown stream status: {other}")),
        }
    }
}

// =============================================================================
// Broadcast topics
// =============================================================================

/// Room-scoped broadcast destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Exact (WebSocket session) viewer count
    ViewerCount(RoomId),
    /// Approximate (heartbeat) viewer count
    PollingViewerCount(RoomId),
    LikeCount(RoomId),
}

impl Topic {
    pub fn room(&self) -> RoomId {
        match self {
            Self::ViewerCount(room) | Self::PollingViewerCount(room) | Self::LikeCount(room) => {
                *room
            }
        }
    }

    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ViewerCount(_) => "viewer_count",
            Self::PollingViewerCount(_) => "polling_viewer_count",
            Self::LikeCount(_) => "like_count",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewerCount(room) => write!(f, "/topic/livestreams/{room}/viewer-count"),
            Self::PollingViewerCount(room) => {
                write!(f, "/topic/livestreams/{room}/polling-viewer-count")
            }
            Self::LikeCount(room) => write!(f, "/topic/livestreams/{room}/like-count"),
        }
    }
}

/// Snapshot returned to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStats {
    pub viewer_count: u64,
    pub like_count: u64,
}
