//! Test doubles and common utilities for contract tests
//!
//! This module provides scripted router clients and a helper to assemble a
//! tracker over a shared memory store.

#![allow(dead_code)]

use linewatch_core::error::{Error, Result};
use linewatch_core::log_line::parse_device_log;
use linewatch_core::model::RawLogLine;
use linewatch_core::traits::{RouterClient, RouterStatus};
use linewatch_core::{
    ConnectionTracker, MemoryStore, OutageIntervalBuilder, TrackerConfig, TrackerEvent,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const V4_DOWN: &str = "01.01.24 10:00:00 Internetverbindung wurde getrennt.";
pub const V4_UP: &str = "01.01.24 10:05:00 Internetverbindung wurde erfolgreich hergestellt.";
pub const PLANNED: &str = "01.01.24 09:59:00 Zwangstrennung angekündigt.";
pub const V6_DOWN: &str = "01.01.24 10:00:00 Internetverbindung IPv6 wurde getrennt.";
pub const V6_UP: &str = "01.01.24 10:02:00 IPv6-Präfix wurde erfolgreich bezogen.";

/// A router whose status and device log are set by the test
pub struct ScriptedRouter {
    connected: AtomicBool,
    log: Mutex<Vec<String>>,
    poll_delay: Duration,
    poll_calls: AtomicUsize,
    polls_completed: AtomicUsize,
    log_calls: AtomicUsize,
}

impl ScriptedRouter {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
            log: Mutex::new(Vec::new()),
            poll_delay: Duration::ZERO,
            poll_calls: AtomicUsize::new(0),
            polls_completed: AtomicUsize::new(0),
            log_calls: AtomicUsize::new(0),
        }
    }

    /// Seed the device log
    pub fn with_log(self, lines: &[&str]) -> Self {
        *self.log.lock().unwrap() = lines.iter().map(|l| l.to_string()).collect();
        self
    }

    /// Make every status poll take `delay`
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = delay;
        self
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Append a line to the device log
    pub fn push_log_line(&self, line: &str) {
        self.log.lock().unwrap().push(line.to_string());
    }

    /// Get the number of times poll_status() was called
    pub fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    /// Get the number of poll_status() calls that ran to completion
    pub fn polls_completed(&self) -> usize {
        self.polls_completed.load(Ordering::SeqCst)
    }

    /// Get the number of times fetch_device_log() was called
    pub fn log_calls(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RouterClient for ScriptedRouter {
    async fn poll_status(&self) -> Result<RouterStatus> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if !self.poll_delay.is_zero() {
            tokio::time::sleep(self.poll_delay).await;
        }

        let connected = self.connected.load(Ordering::SeqCst);
        self.polls_completed.fetch_add(1, Ordering::SeqCst);

        Ok(RouterStatus::new(connected)
            .with_detail(
                "NewConnectionStatus",
                if connected { "Connected" } else { "Disconnected" },
            )
            .with_detail("NewExternalIPAddress", "203.0.113.7"))
    }

    async fn fetch_device_log(&self) -> Result<Vec<RawLogLine>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        let blob = self.log.lock().unwrap().join("\n");
        Ok(parse_device_log(&blob))
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// A router that is never reachable
#[derive(Default)]
pub struct FailingRouter {
    calls: AtomicUsize,
}

impl FailingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of calls across both operations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl RouterClient for FailingRouter {
    async fn poll_status(&self) -> Result<RouterStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::router("router unreachable"))
    }

    async fn fetch_device_log(&self) -> Result<Vec<RawLogLine>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::router("router unreachable"))
    }

    fn client_name(&self) -> &'static str {
        "failing"
    }
}

/// A router whose status poll panics
pub struct PanickingRouter;

#[async_trait::async_trait]
impl RouterClient for PanickingRouter {
    async fn poll_status(&self) -> Result<RouterStatus> {
        panic!("status decoder blew up");
    }

    async fn fetch_device_log(&self) -> Result<Vec<RawLogLine>> {
        Ok(Vec::new())
    }

    fn client_name(&self) -> &'static str {
        "panicking"
    }
}

/// Tracker settings with one-second intervals
pub fn fast_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval_secs: 1,
        log_sync_interval_secs: 1,
        event_channel_capacity: 100,
    }
}

/// Settings whose intervals never elapse during a test
pub fn idle_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval_secs: 3600,
        log_sync_interval_secs: 3600,
        event_channel_capacity: 100,
    }
}

/// Assemble a tracker with all three stores backed by `store`
pub fn build_tracker(
    router: Arc<dyn RouterClient>,
    store: &MemoryStore,
    config: &TrackerConfig,
) -> (ConnectionTracker, mpsc::Receiver<TrackerEvent>) {
    ConnectionTracker::new(
        router,
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        OutageIntervalBuilder::default(),
        config,
    )
    .expect("tracker construction succeeds")
}

/// Drain every event currently buffered on the channel
pub fn drain(rx: &mut mpsc::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
