//! HTTP and WebSocket handlers
//!
//! Thin adapters: each handler translates one request into one
//! `InteractionService` call.
//! - Polling viewer stats (v2)
//! - Reactions (toggle, like count, own reaction)
//! - Broadcast lifecycle and chat gate
//! - Viewer WebSocket sessions

pub mod lifecycle;
pub mod polling;
pub mod reactions;
pub mod viewer_ws;

use crate::metrics;
use actix_web::{web, HttpResponse};

async fn health() -> HttpResponse {
    HttpResponse::Ok().body("OK")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(polling::live_stats)
        .service(reactions::toggle_reaction)
        .service(reactions::like_count)
        .service(reactions::my_reaction)
        .service(lifecycle::start_stream)
        .service(lifecycle::end_stream)
        .service(lifecycle::chat_status)
        .service(viewer_ws::viewer_ws)
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics::serve_metrics));
}
