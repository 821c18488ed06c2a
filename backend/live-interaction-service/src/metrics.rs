use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, TextEncoder};

static BROADCASTS_PUBLISHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_interaction_broadcasts_published_total",
            "Count frames delivered to at least one subscriber",
        ),
        &["topic"],
    )
    .expect("failed to create live_interaction_broadcasts_published_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_broadcasts_published_total");
    counter
});

static BROADCAST_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_interaction_broadcast_failures_total",
            "Count frames dropped by the broadcast sink",
        ),
        &["topic", "reason"],
    )
    .expect("failed to create live_interaction_broadcast_failures_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_broadcast_failures_total");
    counter
});

static BROADCASTS_SKIPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_interaction_broadcasts_skipped_total",
            "Count frames with nobody subscribed to the topic",
        ),
        &["topic"],
    )
    .expect("failed to create live_interaction_broadcasts_skipped_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_broadcasts_skipped_total");
    counter
});

static REACTION_TOGGLES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "live_interaction_reaction_toggles_total",
            "Committed reaction toggles by resulting state",
        ),
        &["result"],
    )
    .expect("failed to create live_interaction_reaction_toggles_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_reaction_toggles_total");
    counter
});

static REACTION_TOGGLE_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_interaction_reaction_toggle_retries_total",
        "Toggles retried after losing a unique-constraint race",
    )
    .expect("failed to create live_interaction_reaction_toggle_retries_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_reaction_toggle_retries_total");
    counter
});

static ACTIVE_ROOMS: Lazy<IntGaugeVec> = Lazy::new(|| {
    let gauge = IntGaugeVec::new(
        Opts::new(
            "live_interaction_active_rooms",
            "Rooms in the viewer-count working set",
        ),
        &["source"],
    )
    .expect("failed to create live_interaction_active_rooms");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register live_interaction_active_rooms");
    gauge
});

static WS_SESSIONS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "live_interaction_ws_sessions",
        "Open viewer WebSocket sessions",
    )
    .expect("failed to create live_interaction_ws_sessions");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register live_interaction_ws_sessions");
    gauge
});

static HEARTBEATS_SWEPT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "live_interaction_heartbeats_swept_total",
        "Expired heartbeat entries removed by the sweeper",
    )
    .expect("failed to create live_interaction_heartbeats_swept_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register live_interaction_heartbeats_swept_total");
    counter
});

pub fn record_broadcast(topic_kind: &str) {
    BROADCASTS_PUBLISHED_TOTAL
        .with_label_values(&[topic_kind])
        .inc();
}

pub fn record_broadcast_failure(topic_kind: &str, reason: &str) {
    BROADCAST_FAILURES_TOTAL
        .with_label_values(&[topic_kind, reason])
        .inc();
}

/// A frame published to a topic nobody subscribes to
pub fn record_broadcast_skipped(topic_kind: &str) {
    BROADCASTS_SKIPPED_TOTAL
        .with_label_values(&[topic_kind])
        .inc();
}

pub fn record_reaction_toggle(result: &str) {
    REACTION_TOGGLES_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_reaction_retry() {
    REACTION_TOGGLE_RETRIES_TOTAL.inc();
}

pub fn set_active_rooms(source: &str, rooms: usize) {
    ACTIVE_ROOMS
        .with_label_values(&[source])
        .set(rooms as i64);
}

pub fn ws_session_opened() {
    WS_SESSIONS.inc();
}

pub fn ws_session_closed() {
    WS_SESSIONS.dec();
}

pub fn record_heartbeats_swept(entries: usize) {
    HEARTBEATS_SWEPT_TOTAL.inc_by(entries as u64);
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Topic;
    use crate::services::broadcast::{publish_count, TopicHub};

    #[test]
    fn test_unheard_frames_are_skips_not_failures() {
        let hub = TopicHub::new(4);
        let skipped_before = BROADCASTS_SKIPPED_TOTAL
            .with_label_values(&["polling_viewer_count"])
            .get();

        assert!(!publish_count(&hub, Topic::PollingViewerCount(9), 3));

        assert!(
            BROADCASTS_SKIPPED_TOTAL
                .with_label_values(&["polling_viewer_count"])
                .get()
                > skipped_before
        );
        assert_eq!(
            BROADCAST_FAILURES_TOTAL
                .with_label_values(&["polling_viewer_count", "no_subscribers"])
                .get(),
            0
        );
    }
}
