//! Connection tracker
//!
//! The ConnectionTracker is responsible for:
//! - Polling live router status and recording status changes
//! - Syncing the router's device log into the log store
//! - Recomputing calculated outages from the stored log
//! - Turning failed cycles into `error` status events
//!
//! ## Architecture
//!
//! ```text
//!                       ┌──────────────┐
//!                       │ RouterClient │
//!                       └──────────────┘
//!                         ▲          ▲
//!              poll_status│          │fetch_device_log
//!                         │          │
//! ┌──────────────────────────┐  ┌──────────────────────────┐
//! │ status scheduler         │  │ log scheduler            │
//! │  poll_now()              │  │  sync_log_once()         │
//! └──────────────────────────┘  └──────────────────────────┘
//!          │                        │                 │
//!          ▼                        ▼                 ▼
//! ┌─────────────┐          ┌─────────────┐   ┌──────────────────────┐
//! │ StatusStore │          │  LogStore   │──▶│ OutageIntervalBuilder │
//! │ (dedup)     │          │ (ingest)    │   └──────────────────────┘
//! └─────────────┘          └─────────────┘              │
//!                                                       ▼
//!                                              ┌─────────────┐
//!                                              │ OutageStore │
//!                                              │ (replace)   │
//!                                              └─────────────┘
//! ```
//!
//! ## Known limitation
//!
//! The status dedup in `poll_now()` is a read-then-write on the status
//! store. It assumes a single poller: an external caller invoking
//! `poll_now()` while the status scheduler is mid-cycle can race and
//! record the same status twice.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::model::ConnectionStatus;
use crate::outage::OutageIntervalBuilder;
use crate::scheduler::{CycleErrorHandler, FirstRun, PeriodicScheduler, PeriodicWork};
use crate::traits::{LogStore, OutageStore, RouterClient, RouterStatus, StatusStore};

/// Cycle tag recorded when a status poll fails
pub const STATUS_POLL_CYCLE: &str = "status_poll";

/// Cycle tag recorded when a log sync fails
pub const LOG_SYNC_CYCLE: &str = "log_sync";

/// Events emitted by the ConnectionTracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Tracker started
    Started,

    /// Tracker stopped
    Stopped,

    /// A status change was persisted
    StatusRecorded { status: ConnectionStatus },

    /// Status matched the last stored event, nothing written
    StatusUnchanged { status: ConnectionStatus },

    /// Device log synced and outages recomputed
    LogSynced { inserted: usize, outages: usize },

    /// A cycle failed and was recorded as an error event
    CycleFailed { cycle: String, error: String },
}

/// Result of a status poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub timestamp: DateTime<Utc>,
    pub status: ConnectionStatus,
    pub details: Value,
    /// Whether a new status event was appended
    pub recorded: bool,
}

/// Result of one log sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogSyncReport {
    /// Lines returned by the router
    pub fetched: usize,
    /// Lines that were new to the log store
    pub inserted: usize,
    /// Calculated outages after recomputation
    pub outages: usize,
}

/// Collaborators shared between the tracker and its scheduled cycles
struct TrackerInner {
    router: Arc<dyn RouterClient>,
    status_store: Arc<dyn StatusStore>,
    log_store: Arc<dyn LogStore>,
    outage_store: Arc<dyn OutageStore>,
    builder: OutageIntervalBuilder,
    event_tx: mpsc::Sender<TrackerEvent>,
}

/// Connection tracker
///
/// Owns two [`PeriodicScheduler`]s, one polling router status and one
/// syncing the device log. Lifecycle is owned by the caller: construct
/// once, `start()`, and `stop()` on shutdown.
///
/// ## Lifecycle
///
/// 1. Create with [`ConnectionTracker::new()`]
/// 2. [`ConnectionTracker::start()`] runs one log sync before returning
/// 3. Schedulers tick until [`ConnectionTracker::stop()`]
///
/// No cycle failure ever stops the tracker. Failures become status events
/// with status `error` and a `CycleFailed` event on the channel.
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
    status_scheduler: PeriodicScheduler,
    log_scheduler: PeriodicScheduler,
    running: Mutex<bool>,
}

impl ConnectionTracker {
    /// Create a new connection tracker
    ///
    /// # Parameters
    ///
    /// - `router`: Router client implementation
    /// - `status_store`: Where status changes are appended
    /// - `log_store`: Where device log lines are ingested
    /// - `outage_store`: Where calculated outages are replaced
    /// - `builder`: Outage interval builder (carries the keyword classifier)
    /// - `config`: Tracker scheduling settings
    ///
    /// # Returns
    ///
    /// A tuple of (tracker, event_receiver) where event_receiver yields tracker events
    pub fn new(
        router: Arc<dyn RouterClient>,
        status_store: Arc<dyn StatusStore>,
        log_store: Arc<dyn LogStore>,
        outage_store: Arc<dyn OutageStore>,
        builder: OutageIntervalBuilder,
        config: &TrackerConfig,
    ) -> Result<(Self, mpsc::Receiver<TrackerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let inner = Arc::new(TrackerInner {
            router,
            status_store,
            log_store,
            outage_store,
            builder,
            event_tx: tx,
        });

        let status_scheduler = PeriodicScheduler::new(
            STATUS_POLL_CYCLE,
            Duration::from_secs(config.poll_interval_secs),
            Arc::new(StatusPollWork(Arc::clone(&inner))),
            Arc::new(CycleFailureRecorder {
                inner: Arc::clone(&inner),
                cycle: STATUS_POLL_CYCLE,
            }),
        );

        // The first log sync runs inside start(), so the repeating one
        // begins a full interval later.
        let log_scheduler = PeriodicScheduler::new(
            LOG_SYNC_CYCLE,
            Duration::from_secs(config.log_sync_interval_secs),
            Arc::new(LogSyncWork(Arc::clone(&inner))),
            Arc::new(CycleFailureRecorder {
                inner: Arc::clone(&inner),
                cycle: LOG_SYNC_CYCLE,
            }),
        )
        .with_first_run(FirstRun::AfterInterval);

        let tracker = Self {
            inner,
            status_scheduler,
            log_scheduler,
            running: Mutex::new(false),
        };

        Ok((tracker, rx))
    }

    /// Start both schedulers
    ///
    /// The status scheduler starts first. One log sync then runs to
    /// completion so outages reflect the router's log before this returns;
    /// a failure there is recorded like any other cycle failure. Calling
    /// `start()` on a running tracker is a no-op.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if *running {
            debug!("Tracker already running");
            return;
        }

        info!(
            router = self.inner.router.client_name(),
            "Starting connection tracker"
        );

        self.status_scheduler.start().await;

        if let Err(e) = self.inner.sync_log_once().await {
            self.inner.record_failure(LOG_SYNC_CYCLE, e).await;
        }

        self.log_scheduler.start().await;

        *running = true;
        self.inner.emit_event(TrackerEvent::Started);
    }

    /// Stop both schedulers, waiting for in-flight cycles to finish
    pub async fn stop(&self) {
        let mut running = self.running.lock().await;
        if !*running {
            return;
        }

        self.status_scheduler.stop().await;
        self.log_scheduler.stop().await;

        *running = false;
        info!("Connection tracker stopped");
        self.inner.emit_event(TrackerEvent::Stopped);
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Poll router status now and record it if it changed
    ///
    /// Returns the live status whether or not a row was written. At most one
    /// status event is appended per call.
    pub async fn poll_now(&self) -> Result<PollResult> {
        self.inner.poll_now().await
    }

    /// Query live router status without touching any store
    pub async fn check_connection(&self) -> Result<RouterStatus> {
        self.inner.router.poll_status().await
    }

    /// Sync the device log and recompute calculated outages once
    pub async fn sync_log_once(&self) -> Result<LogSyncReport> {
        self.inner.sync_log_once().await
    }
}

impl TrackerInner {
    async fn poll_now(&self) -> Result<PollResult> {
        let router_status = self.router.poll_status().await?;
        let status = ConnectionStatus::from_connected(router_status.connected);
        let timestamp = Utc::now();
        let details = Value::Object(router_status.details);

        let previous = self.status_store.latest_event().await?;
        let recorded = previous.as_ref().is_none_or(|event| event.status != status);

        if recorded {
            self.status_store
                .record_event(status, timestamp, details.clone())
                .await?;
            info!(
                "Connection status changed: {} -> {}",
                previous.map(|e| e.status.as_str()).unwrap_or("none"),
                status.as_str()
            );
            self.emit_event(TrackerEvent::StatusRecorded { status });
        } else {
            debug!("Connection status unchanged: {}", status.as_str());
            self.emit_event(TrackerEvent::StatusUnchanged { status });
        }

        Ok(PollResult {
            timestamp,
            status,
            details,
            recorded,
        })
    }

    async fn sync_log_once(&self) -> Result<LogSyncReport> {
        let lines = self.router.fetch_device_log().await?;
        let inserted = self
            .log_store
            .ingest_entries(&lines, self.router.client_name())
            .await?;

        let entries = self.log_store.list_entries(None, true).await?;
        let intervals = self.builder.build(&entries);
        self.outage_store.replace_calculated_outages(&intervals).await?;

        let report = LogSyncReport {
            fetched: lines.len(),
            inserted,
            outages: intervals.len(),
        };

        debug!(
            "Log sync: {} lines fetched, {} new, {} calculated outages",
            report.fetched, report.inserted, report.outages
        );
        self.emit_event(TrackerEvent::LogSynced {
            inserted: report.inserted,
            outages: report.outages,
        });

        Ok(report)
    }

    /// Record a failed cycle as an `error` status event
    ///
    /// Error events are always appended, regardless of the last stored status.
    async fn record_failure(&self, cycle: &str, error: Error) {
        let message = error.to_string();
        let details = json!({ "cycle": cycle, "error": message });

        if let Err(e) = self
            .status_store
            .record_event(ConnectionStatus::Error, Utc::now(), details)
            .await
        {
            error!("Failed to record {} failure ({}): {}", cycle, message, e);
        }

        self.emit_event(TrackerEvent::CycleFailed {
            cycle: cycle.to_string(),
            error: message,
        });
    }

    /// Returns whether the event reached the channel
    fn emit_event(&self, event: TrackerEvent) -> bool {
        match self.event_tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Event receiver dropped, discarding event");
                false
            }
        }
    }
}

struct StatusPollWork(Arc<TrackerInner>);

#[async_trait]
impl PeriodicWork for StatusPollWork {
    async fn run(&self) -> Result<()> {
        self.0.poll_now().await.map(|_| ())
    }
}

struct LogSyncWork(Arc<TrackerInner>);

#[async_trait]
impl PeriodicWork for LogSyncWork {
    async fn run(&self) -> Result<()> {
        self.0.sync_log_once().await.map(|_| ())
    }
}

struct CycleFailureRecorder {
    inner: Arc<TrackerInner>,
    cycle: &'static str,
}

#[async_trait]
impl CycleErrorHandler for CycleFailureRecorder {
    async fn handle(&self, error: Error) {
        self.inner.record_failure(self.cycle, error).await;
    }
}
