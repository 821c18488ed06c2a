//! HTTP surface over in-memory backends

use actix_web::{http::StatusCode, test, web, App};
use live_interaction_service::config::{Config, PresenceConfig};
use live_interaction_service::handlers;
use live_interaction_service::models::StreamStatus;
use live_interaction_service::services::reaction::InMemoryReactionStore;
use live_interaction_service::services::stream_status::InMemoryStreamStatusLookup;
use live_interaction_service::state::{AppComponents, AppState, Backends};
use serde_json::{json, Value};
use std::sync::Arc;

fn components() -> AppComponents {
    let config = Arc::new(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        database: None,
        presence: PresenceConfig::default(),
    });

    let reactions = InMemoryReactionStore::new();
    let statuses = InMemoryStreamStatusLookup::new();
    for room in [1, 2] {
        reactions.register_room(room);
    }
    for user in [7, 8, 42] {
        reactions.register_user(user);
    }
    statuses.insert(1, StreamStatus::Scheduled);
    statuses.insert(2, StreamStatus::Live);

    AppState::assemble(
        config,
        Backends {
            reactions: Arc::new(reactions),
            statuses: Arc::new(statuses),
        },
    )
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn test_live_stats_counts_polling_viewers() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/2/live-stats?client_id=abc")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"viewerCount": 1, "likeCount": 0}));

    // same client again, then a second client
    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/2/live-stats?client_id=abc")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["viewerCount"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/2/live-stats?client_id=xyz")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["viewerCount"], 2);
}

#[actix_web::test]
async fn test_live_stats_requires_identity() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/2/live-stats")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_reaction_toggle_round() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/2/reactions")
        .set_json(json!({"user_id": 7, "type": "LIKE"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"reactionType": "LIKE"}));

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/2/reactions/like-count")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["likeCount"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/2/reactions/me?user_id=7")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["reactionType"], "LIKE");

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/2/reactions")
        .set_json(json!({"user_id": 7, "type": "LIKE"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"reactionType": null}));

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/2/reactions/me")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["reactionType"], Value::Null);
}

#[actix_web::test]
async fn test_reaction_on_unknown_room_is_not_found() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/99/reactions")
        .set_json(json!({"user_id": 7, "type": "DISLIKE"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_web::test]
async fn test_stream_lifecycle_gates_chat() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/1/chat-status")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/start")
        .set_json(json!({"streamer_id": 42}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "LIVE");

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/1/chat-status")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["chatAllowed"], true);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/end")
        .set_json(json!({"user_id": 8}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/end")
        .set_json(json!({"user_id": 42}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ENDED");

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/1/chat-status")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/start")
        .set_json(json!({"streamer_id": 42}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[actix_web::test]
async fn test_streamer_excluded_from_polling_count() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/start")
        .set_json(json!({"streamer_id": 42}))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/1/live-stats?client_id=studio&user_id=42")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["viewerCount"], 0);

    let req = test::TestRequest::get()
        .uri("/api/v2/livestreams/1/live-stats?client_id=fan")
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["viewerCount"], 1);
}

#[actix_web::test]
async fn test_second_start_keeps_original_streamer() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/start")
        .set_json(json!({"streamer_id": 42}))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/start")
        .set_json(json!({"streamer_id": 8}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "CONFLICT");

    // user 42 is still the one excluded from the audience count
    let presence = components.state.interaction.presence();
    presence.add_subscriber(1, "s42", Some(42), None);
    presence.add_subscriber(1, "s8", Some(8), None);
    assert_eq!(presence.viewer_count_excluding_streamer(1), 1);
    presence.remove_subscriber("s8");
    assert_eq!(presence.viewer_count_excluding_streamer(1), 0);

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/end")
        .set_json(json!({"user_id": 8}))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::FORBIDDEN
    );

    let req = test::TestRequest::post()
        .uri("/api/v1/livestreams/1/end")
        .set_json(json!({"user_id": 42}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "ENDED");
}

#[actix_web::test]
async fn test_unknown_room_chat_status_is_not_found() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::get()
        .uri("/api/v1/livestreams/404/chat-status")
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[actix_web::test]
async fn test_health_and_metrics() {
    let components = components();
    let app = app!(components.state);

    let req = test::TestRequest::get().uri("/health").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = test::TestRequest::get().uri("/metrics").to_request();
    assert!(test::call_service(&app, req).await.status().is_success());
}
