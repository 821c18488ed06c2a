//! WebSocket session for push-based viewers
//!
//! `GET /ws/livestreams/{id}?user_id=&client_id=`
//!
//! The session registers itself in the presence index when it starts and
//! leaves when it stops, so the socket's lifetime is exactly the viewer's
//! presence. It forwards the room's viewer-count and like-count frames:
//!
//! ```json
//! {"topic": "/topic/livestreams/42/viewer-count", "count": 17}
//! ```
//!
//! Clients may send `{"type":"subscribe","livestream_id":43}` to move to
//! another room and `{"type":"ping"}` as an application-level keepalive.

use crate::metrics;
use crate::models::{RoomId, Topic, UserId};
use crate::state::AppState;
use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Message as ActixMessage, StreamHandler};
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ViewerWsParams {
    pub user_id: Option<UserId>,
    pub client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ViewerInbound {
    Subscribe { livestream_id: RoomId },
    Ping,
}

#[derive(Debug, Serialize)]
struct CountFrame {
    topic: String,
    count: u64,
}

#[derive(ActixMessage)]
#[rtype(result = "()")]
struct TopicFrame {
    topic: Topic,
    count: u64,
}

/// Hub receivers for the room a session is currently in
pub struct RoomFeeds {
    pub viewers: (Topic, broadcast::Receiver<String>),
    pub likes: (Topic, broadcast::Receiver<String>),
}

/// Presence bookkeeping of one socket: which room it counts in and which
/// topics it listens to. Owned by the session actor.
pub struct ViewerMembership {
    session_id: String,
    room: RoomId,
    user_id: Option<UserId>,
    client_id: Option<String>,
}

impl ViewerMembership {
    pub fn new(room: RoomId, params: ViewerWsParams) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            room,
            user_id: params.user_id,
            client_id: params.client_id.filter(|c| !c.is_empty()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn room(&self) -> RoomId {
        self.room
    }

    /// Count the session in its current room and open that room's topics
    pub fn join(&self, state: &AppState) -> RoomFeeds {
        state.interaction.on_subscribe(
            self.room,
            &self.session_id,
            self.user_id,
            self.client_id.as_deref(),
        );

        let viewer_topic = Topic::ViewerCount(self.room);
        let like_topic = Topic::LikeCount(self.room);
        let viewers = state.hub.subscribe(&viewer_topic);
        let likes = state.hub.subscribe(&like_topic);

        RoomFeeds {
            viewers: (viewer_topic, viewers),
            likes: (like_topic, likes),
        }
    }

    /// Move to `room` and join it. `None` when the session is already there.
    pub fn switch_room(&mut self, room: RoomId, state: &AppState) -> Option<RoomFeeds> {
        if room == self.room {
            return None;
        }
        self.room = room;
        Some(self.join(state))
    }

    pub fn leave(&self, state: &AppState) -> Option<RoomId> {
        state.interaction.on_disconnect(&self.session_id)
    }
}

pub struct ViewerSession {
    membership: ViewerMembership,
    state: AppState,
    hb: Instant,
    forwarder: Option<JoinHandle<()>>,
}

impl ViewerSession {
    fn new(room: RoomId, params: ViewerWsParams, state: AppState) -> Self {
        Self {
            membership: ViewerMembership::new(room, params),
            state,
            hb: Instant::now(),
            forwarder: None,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!(session_id = %act.membership.session_id(), "Viewer heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn forward(&mut self, feeds: RoomFeeds, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some(previous) = self.forwarder.take() {
            previous.abort();
        }
        self.forwarder = Some(actix_rt::spawn(forward_frames(feeds, ctx.address())));
    }
}

/// Relay hub frames for one room to the session actor until either side goes away
async fn forward_frames(feeds: RoomFeeds, addr: Addr<ViewerSession>) {
    let RoomFeeds {
        viewers: (viewer_topic, mut viewers),
        likes: (like_topic, mut likes),
    } = feeds;

    loop {
        let (topic, received) = tokio::select! {
            received = viewers.recv() => (viewer_topic, received),
            received = likes.recv() => (like_topic, received),
        };

        match received {
            Ok(payload) => match payload.parse::<u64>() {
                Ok(count) => addr.do_send(TopicFrame { topic, count }),
                Err(e) => warn!(topic = %topic, error = %e, "Unreadable count frame"),
            },
            Err(RecvError::Lagged(skipped)) => {
                debug!(topic = %topic, skipped, "Viewer session lagged behind topic");
            }
            Err(RecvError::Closed) => break,
        }

        if !addr.connected() {
            break;
        }
    }
}

impl Actor for ViewerSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            session_id = %self.membership.session_id(),
            room = self.membership.room(),
            user_id = ?self.membership.user_id,
            "Viewer WebSocket session started"
        );
        metrics::ws_session_opened();

        self.hb(ctx);
        let feeds = self.membership.join(&self.state);
        self.forward(feeds, ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.membership.leave(&self.state);
        metrics::ws_session_closed();

        info!(
            session_id = %self.membership.session_id(),
            room = self.membership.room(),
            "Viewer WebSocket session stopped"
        );
    }
}

impl Handler<TopicFrame> for ViewerSession {
    type Result = ();

    fn handle(&mut self, msg: TopicFrame, ctx: &mut Self::Context) {
        // Frames from a room the session already left are stale
        if msg.topic.room() != self.membership.room() {
            return;
        }

        let frame = CountFrame {
            topic: msg.topic.to_string(),
            count: msg.count,
        };
        match serde_json::to_string(&frame) {
            Ok(json) => ctx.text(json),
            Err(e) => warn!("Failed to serialize count frame: {}", e),
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ViewerSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ViewerInbound>(&text) {
                Ok(ViewerInbound::Subscribe { livestream_id }) => {
                    self.hb = Instant::now();
                    if let Some(feeds) = self.membership.switch_room(livestream_id, &self.state) {
                        self.forward(feeds, ctx);
                    }
                    ctx.text(
                        serde_json::json!({"type": "subscribed", "livestream_id": livestream_id})
                            .to_string(),
                    );
                }
                Ok(ViewerInbound::Ping) => {
                    self.hb = Instant::now();
                    ctx.text(serde_json::json!({"type": "pong"}).to_string());
                }
                Err(e) => {
                    warn!(session_id = %self.membership.session_id(), error = %e, "Failed to parse viewer message");
                    ctx.text(
                        serde_json::json!({"type": "error", "message": "unsupported message"})
                            .to_string(),
                    );
                }
            },
            Ok(ws::Message::Binary(_)) => {
                warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                debug!(session_id = %self.membership.session_id(), ?reason, "Viewer closed the socket");
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!(session_id = %self.membership.session_id(), error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[get("/ws/livestreams/{id}")]
pub async fn viewer_ws(
    req: HttpRequest,
    path: web::Path<RoomId>,
    query: web::Query<ViewerWsParams>,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let session = ViewerSession::new(
        path.into_inner(),
        query.into_inner(),
        state.get_ref().clone(),
    );
    ws::start(session, &req, payload)
}
