//! Contract Test: Failure Isolation
//!
//! This test verifies that no failing cycle can stop the tracker.
//!
//! Constraints verified:
//! - Router failures become `error` status events tagged with their cycle
//! - Failing cycles keep being retried on the next tick, never earlier
//! - A panicking work unit is reported like a failed one
//! - A failed recomputation leaves the previous outages untouched
//!
//! If this test fails, someone has let an error escape a scheduled cycle.

mod common;

use async_trait::async_trait;
use common::*;
use linewatch_core::error::{Error, Result};
use linewatch_core::model::{ConnectionStatus, OutageInterval, OutageRecord, OutageStatus};
use linewatch_core::scheduler::{CycleErrorHandler, PeriodicScheduler, PeriodicWork};
use linewatch_core::traits::{OutageStore, StatusStore};
use linewatch_core::{ConnectionTracker, MemoryStore, OutageIntervalBuilder, TrackerEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::test]
async fn router_failures_become_tagged_error_events() {
    let router = Arc::new(FailingRouter::new());
    let store = MemoryStore::new();
    let (tracker, mut event_rx) = build_tracker(router.clone(), &store, &idle_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tracker.is_running().await, "Failures must not stop the tracker");
    tracker.stop().await;

    let events = store.list_events(None, None).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.status == ConnectionStatus::Error));

    let mut cycles: Vec<_> = events
        .iter()
        .map(|e| e.details["cycle"].as_str().unwrap().to_string())
        .collect();
    cycles.sort();
    assert_eq!(cycles, vec!["log_sync", "status_poll"]);
    assert!(
        events[0].details["error"]
            .as_str()
            .unwrap()
            .contains("router unreachable")
    );

    let failed = drain(&mut event_rx)
        .into_iter()
        .filter(|e| matches!(e, TrackerEvent::CycleFailed { .. }))
        .count();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn failing_cycles_keep_ticking() {
    let router = Arc::new(FailingRouter::new());
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &fast_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(2300)).await;
    tracker.stop().await;

    let calls = router.calls();
    assert!(calls >= 4, "Expected repeated attempts, got {}", calls);

    // Every failed call was recorded, each exactly once
    let events = store.list_events(None, None).await.unwrap();
    assert_eq!(events.len(), calls);
}

#[tokio::test]
async fn panicking_poll_is_recorded_as_error() {
    let store = MemoryStore::new();
    let (tracker, _event_rx) = build_tracker(Arc::new(PanickingRouter), &store, &idle_config());

    tracker.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(tracker.is_running().await);
    tracker.stop().await;

    let latest = store
        .latest_event()
        .await
        .unwrap()
        .expect("error event recorded");
    assert_eq!(latest.status, ConnectionStatus::Error);
    assert_eq!(latest.details["cycle"], "status_poll");
    assert!(
        latest.details["error"]
            .as_str()
            .unwrap()
            .contains("cycle aborted")
    );
}

/// Outage store whose replacement always fails
struct BrokenOutageStore {
    inner: MemoryStore,
}

#[async_trait]
impl OutageStore for BrokenOutageStore {
    async fn replace_calculated_outages(&self, _intervals: &[OutageInterval]) -> Result<()> {
        Err(Error::store("disk full"))
    }

    async fn list_outages(&self) -> Result<Vec<OutageRecord>> {
        self.inner.list_outages().await
    }

    async fn create_manual_outage(
        &self,
        start: chrono::NaiveDateTime,
        end: Option<chrono::NaiveDateTime>,
        status: OutageStatus,
    ) -> Result<u64> {
        self.inner.create_manual_outage(start, end, status).await
    }
}

#[tokio::test]
async fn failed_recomputation_keeps_previous_outages() {
    let store = MemoryStore::new();
    let router = Arc::new(ScriptedRouter::new(true).with_log(&[V4_DOWN]));

    // Seed a calculated outage through a working tracker
    let (tracker, _event_rx) = build_tracker(router.clone(), &store, &idle_config());
    tracker.sync_log_once().await.unwrap();

    router.push_log_line(V4_UP);
    let (broken, _event_rx) = ConnectionTracker::new(
        router.clone(),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(BrokenOutageStore {
            inner: store.clone(),
        }),
        OutageIntervalBuilder::default(),
        &idle_config(),
    )
    .unwrap();

    let result = broken.sync_log_once().await;
    assert!(matches!(result, Err(Error::Store(_))));

    let outages = store.list_outages().await.unwrap();
    assert_eq!(outages.len(), 1);
    assert_eq!(outages[0].status, OutageStatus::Open);
}

struct PanicOnce {
    runs: AtomicUsize,
}

#[async_trait]
impl PeriodicWork for PanicOnce {
    async fn run(&self) -> Result<()> {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("first cycle panics");
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingHandler {
    errors: AtomicUsize,
}

#[async_trait]
impl CycleErrorHandler for CountingHandler {
    async fn handle(&self, error: Error) {
        assert!(matches!(error, Error::Scheduler(_)));
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn scheduler_survives_a_panicking_cycle() {
    let work = Arc::new(PanicOnce {
        runs: AtomicUsize::new(0),
    });
    let handler = Arc::new(CountingHandler::default());
    let scheduler = PeriodicScheduler::new(
        "panic-once",
        Duration::from_millis(10),
        work.clone(),
        handler.clone(),
    );

    scheduler.start().await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert_eq!(handler.errors.load(Ordering::SeqCst), 1);
    assert!(work.runs.load(Ordering::SeqCst) >= 3);
}
