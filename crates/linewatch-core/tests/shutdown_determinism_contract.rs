//! Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - stop() waits for the in-flight cycle to finish
//! - No cycle runs after stop() returns
//! - stop() is prompt while schedulers are waiting
//! - start() and stop() are idempotent
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Mid-cycle aborts

mod common;

use common::*;
use linewatch_core::traits::StatusStore;
use linewatch_core::{MemoryStore, TrackerEvent};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn stop_waits_for_in_flight_poll() {
    let router = Arc::new(ScriptedRouter::new(true).with_poll_delay(Duration::from_millis(300)));
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &idle_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(router.poll_calls(), 1);
    assert_eq!(router.polls_completed(), 0, "Poll should still be in flight");

    tracker.stop().await;

    assert_eq!(router.polls_completed(), 1, "stop() must not abort the cycle");
    assert_eq!(store.list_events(None, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn no_cycles_after_stop() {
    let router = Arc::new(ScriptedRouter::new(true));
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &fast_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracker.stop().await;

    let polls = router.poll_calls();
    let syncs = router.log_calls();

    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(router.poll_calls(), polls);
    assert_eq!(router.log_calls(), syncs);
}

#[tokio::test]
async fn stop_is_prompt_while_waiting() {
    let router = Arc::new(ScriptedRouter::new(true));
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &idle_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = tokio::time::timeout(Duration::from_secs(1), tracker.stop()).await;
    assert!(
        result.is_ok(),
        "stop() should not wait out an hour-long interval"
    );
    assert!(!tracker.is_running().await);
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let router = Arc::new(ScriptedRouter::new(true));
    let store = MemoryStore::new();
    let (tracker, mut event_rx) = build_tracker(router.clone(), &store, &idle_config());

    tracker.stop().await;
    tracker.start().await;
    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracker.stop().await;
    tracker.stop().await;

    assert_eq!(router.log_calls(), 1, "Startup sync runs once");
    assert_eq!(router.poll_calls(), 1);

    let lifecycle: Vec<_> = drain(&mut event_rx)
        .into_iter()
        .filter(|e| matches!(e, TrackerEvent::Started | TrackerEvent::Stopped))
        .collect();
    assert_eq!(lifecycle, vec![TrackerEvent::Started, TrackerEvent::Stopped]);
}

#[tokio::test]
async fn tracker_can_restart_after_stop() {
    let router = Arc::new(ScriptedRouter::new(true));
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &idle_config());

    tracker.start().await;
    tracker.stop().await;
    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    tracker.stop().await;

    assert_eq!(router.log_calls(), 2);
    assert_eq!(router.poll_calls(), 2);
}
