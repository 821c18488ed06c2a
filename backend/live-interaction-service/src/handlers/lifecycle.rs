use crate::error::AppError;
use crate::models::{RoomId, StreamStatus, UserId};
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct StartStreamRequest {
    pub streamer_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct EndStreamRequest {
    pub user_id: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusResponse {
    pub livestream_id: RoomId,
    pub status: StreamStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStatusResponse {
    pub livestream_id: RoomId,
    pub chat_allowed: bool,
}

#[post("/api/v1/livestreams/{id}/start")]
pub async fn start_stream(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
    body: web::Json<StartStreamRequest>,
) -> Result<HttpResponse, AppError> {
    let room = room.into_inner();
    state
        .interaction
        .on_stream_start(room, body.streamer_id)
        .await?;

    Ok(HttpResponse::Ok().json(StreamStatusResponse {
        livestream_id: room,
        status: StreamStatus::Live,
    }))
}

#[post("/api/v1/livestreams/{id}/end")]
pub async fn end_stream(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
    body: web::Json<EndStreamRequest>,
) -> Result<HttpResponse, AppError> {
    let room = room.into_inner();
    state.interaction.on_stream_end(room, body.user_id).await?;

    Ok(HttpResponse::Ok().json(StreamStatusResponse {
        livestream_id: room,
        status: StreamStatus::Ended,
    }))
}

/// GET /api/v1/livestreams/{id}/chat-status
/// 200 when chat is open, 400 while the broadcast is not live, 404 for unknown rooms
#[get("/api/v1/livestreams/{id}/chat-status")]
pub async fn chat_status(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
) -> Result<HttpResponse, AppError> {
    let room = room.into_inner();
    state.interaction.ensure_chat_allowed(room).await?;

    Ok(HttpResponse::Ok().json(ChatStatusResponse {
        livestream_id: room,
        chat_allowed: true,
    }))
}
