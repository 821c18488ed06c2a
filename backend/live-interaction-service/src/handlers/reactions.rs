use crate::error::AppError;
use crate::models::{ReactionType, RoomId, UserId};
use crate::state::AppState;
use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ToggleReactionRequest {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub reaction_type: ReactionType,
}

#[derive(Debug, Deserialize)]
pub struct MyReactionQuery {
    pub user_id: Option<UserId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeCountResponse {
    pub livestream_id: RoomId,
    pub like_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyReactionResponse {
    pub reaction_type: Option<ReactionType>,
}

/// POST /api/v1/livestreams/{id}/reactions
/// Toggle LIKE/DISLIKE for the caller; the response carries the resulting state
#[post("/api/v1/livestreams/{id}/reactions")]
pub async fn toggle_reaction(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
    body: web::Json<ToggleReactionRequest>,
) -> Result<HttpResponse, AppError> {
    let result = state
        .interaction
        .on_reaction_request(room.into_inner(), body.user_id, body.reaction_type)
        .await?;

    Ok(HttpResponse::Ok().json(result))
}

#[get("/api/v1/livestreams/{id}/reactions/like-count")]
pub async fn like_count(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
) -> Result<HttpResponse, AppError> {
    let room = room.into_inner();
    let like_count = state.interaction.like_count(room).await?;

    Ok(HttpResponse::Ok().json(LikeCountResponse {
        livestream_id: room,
        like_count,
    }))
}

#[get("/api/v1/livestreams/{id}/reactions/me")]
pub async fn my_reaction(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
    query: web::Query<MyReactionQuery>,
) -> Result<HttpResponse, AppError> {
    let reaction_type = state
        .interaction
        .user_reaction(room.into_inner(), query.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(MyReactionResponse { reaction_type }))
}
