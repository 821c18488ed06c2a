use crate::error::AppError;
use crate::models::{RoomId, UserId};
use crate::state::AppState;
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct LiveStatsQuery {
    pub client_id: Option<String>,
    pub user_id: Option<UserId>,
}

/// GET /api/v2/livestreams/{id}/live-stats
/// Polling clients call this every few seconds; each call is also their heartbeat.
#[get("/api/v2/livestreams/{id}/live-stats")]
pub async fn live_stats(
    state: web::Data<AppState>,
    room: web::Path<RoomId>,
    query: web::Query<LiveStatsQuery>,
) -> Result<HttpResponse, AppError> {
    let client_id = query.client_id.as_deref().unwrap_or_default();
    if client_id.is_empty() && query.user_id.is_none() {
        return Err(AppError::BadRequest(
            "client_id or user_id is required".into(),
        ));
    }

    let stats = state
        .interaction
        .on_poll(room.into_inner(), client_id, query.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(stats))
}
