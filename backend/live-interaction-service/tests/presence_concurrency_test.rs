//! Presence indices under concurrent writers

use live_interaction_service::services::presence::{HeartbeatIndex, PresenceIndex, StreamerRegistry};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn presence() -> Arc<PresenceIndex> {
    Arc::new(PresenceIndex::new(Arc::new(StreamerRegistry::new())))
}

#[test]
fn test_adders_and_removers_converge_to_exact_count() {
    let index = presence();
    for i in 0..10 {
        index.add_subscriber(1, &format!("existing-{i}"), Some(i), None);
    }

    let barrier = Arc::new(Barrier::new(30));
    let mut handles = Vec::new();

    for i in 0..20 {
        let index = index.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            index.add_subscriber(1, &format!("new-{i}"), None, Some(&format!("client-{i}")));
        }));
    }
    for i in 0..10 {
        let index = index.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            index.remove_subscriber(&format!("existing-{i}"));
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.subscriber_count(1), 20);
    assert_eq!(index.session_total(), 20);
}

#[test]
fn test_concurrent_churn_in_one_room_leaves_no_residue() {
    let index = presence();
    let mut handles = Vec::new();

    for t in 0..8 {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            for i in 0..200 {
                let session = format!("t{t}-s{i}");
                index.add_subscriber(7, &session, Some(t), None);
                index.remove_subscriber(&session);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(index.subscriber_count(7), 0);
    assert!(index.active_rooms().is_empty());
}

#[test]
fn test_same_user_three_sessions_counts_three() {
    let index = presence();

    index.add_subscriber(1, "tab-1", Some(123), None);
    index.add_subscriber(1, "tab-2", Some(123), None);
    index.add_subscriber(1, "tab-3", Some(123), None);

    assert_eq!(index.subscriber_count(1), 3);
}

#[test]
fn test_moving_session_never_counts_in_both_rooms() {
    let index = presence();
    index.add_subscriber(1, "mover", Some(1), None);
    index.add_subscriber(1, "stayer", Some(2), None);

    let barrier = Arc::new(Barrier::new(2));
    let writer = {
        let index = index.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            for i in 0..500 {
                let room = if i % 2 == 0 { 2 } else { 1 };
                index.add_subscriber(room, "mover", Some(1), None);
            }
        })
    };
    let reader = {
        let index = index.clone();
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..500 {
                let in_one = index.subscriber_count(1);
                let in_two = index.subscriber_count(2);
                assert!((1..=2).contains(&in_one), "room 1 holds {in_one}");
                assert!(in_two <= 1, "room 2 holds {in_two}");
                assert_eq!(index.session_total(), 2);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    // 500 moves: last one (i = 499) lands in room 1
    assert_eq!(index.subscriber_count(1), 2);
    assert_eq!(index.subscriber_count(2), 0);
    assert_eq!(index.session_room("mover"), Some(1));
}

#[test]
fn test_concurrent_heartbeats_dedup_by_viewer() {
    let streamers = Arc::new(StreamerRegistry::new());
    let index = Arc::new(HeartbeatIndex::new(Duration::from_secs(30), streamers));
    let mut handles = Vec::new();

    for t in 0..10 {
        let index = index.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                index.record_heartbeat(3, &format!("client-{i}"), None);
                index.record_heartbeat(3, &format!("device-{t}"), Some(99));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // 50 anonymous clients plus one user across ten devices
    assert_eq!(index.viewer_count(3), 51);
}

#[test]
fn test_shared_streamer_binding_excludes_in_both_indices() {
    let streamers = Arc::new(StreamerRegistry::new());
    let sessions = PresenceIndex::new(streamers.clone());
    let heartbeats = HeartbeatIndex::new(Duration::from_secs(30), streamers);

    sessions.register_streamer(5, 42);

    sessions.add_subscriber(5, "studio", Some(42), None);
    heartbeats.record_heartbeat(5, "studio-poller", Some(42));
    heartbeats.record_heartbeat(5, "viewer", None);

    assert_eq!(sessions.viewer_count_excluding_streamer(5), 0);
    assert_eq!(heartbeats.viewer_count_excluding_streamer(5), 1);

    heartbeats.end_live_streaming(5);
    assert_eq!(sessions.viewer_count_excluding_streamer(5), 1);
}
