//! Fixed-interval repeating executor
//!
//! [`PeriodicScheduler`] runs a unit of work once per interval until it is
//! stopped.
//!
//! ## Cycle
//!
//! ```text
//!   ┌──────────────┐   Err / panic   ┌────────────────┐
//!   │  run work    │────────────────▶│ error handler  │
//!   └──────────────┘                 └────────────────┘
//!          │ Ok                              │
//!          ▼                                 ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │ wait: interval elapsed ─▶ next cycle             │
//!   │       stop signalled   ─▶ exit                   │
//!   └──────────────────────────────────────────────────┘
//! ```
//!
//! Work runs on its own task per cycle while the loop task only awaits it
//! and then waits on the cancellation token. A stop request is observed at
//! the next wait boundary; in-flight work always runs to completion and
//! `stop()` waits for it. At most one work execution is in flight per
//! scheduler.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

/// A unit of work executed once per cycle
#[async_trait]
pub trait PeriodicWork: Send + Sync + 'static {
    async fn run(&self) -> Result<()>;
}

/// Receives the failure of a cycle
///
/// Handlers must not fail; anything they cannot deal with they log.
#[async_trait]
pub trait CycleErrorHandler: Send + Sync + 'static {
    async fn handle(&self, error: Error);
}

/// When the first execution happens after `start()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FirstRun {
    /// Run the work as soon as the scheduler starts
    #[default]
    Immediately,
    /// Wait one interval before the first run
    AfterInterval,
}

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Fixed-interval repeating executor with cooperative cancellation
pub struct PeriodicScheduler {
    name: &'static str,
    interval: Duration,
    first_run: FirstRun,
    work: Arc<dyn PeriodicWork>,
    on_error: Arc<dyn CycleErrorHandler>,
    running: Mutex<Option<Running>>,
}

impl PeriodicScheduler {
    /// Create a stopped scheduler
    ///
    /// # Parameters
    ///
    /// - `name`: Label used in logs
    /// - `interval`: Wait between the end of one cycle and the start of the next
    /// - `work`: The unit of work
    /// - `on_error`: Invoked with every failed or panicked cycle
    pub fn new(
        name: &'static str,
        interval: Duration,
        work: Arc<dyn PeriodicWork>,
        on_error: Arc<dyn CycleErrorHandler>,
    ) -> Self {
        Self {
            name,
            interval,
            first_run: FirstRun::default(),
            work,
            on_error,
            running: Mutex::new(None),
        }
    }

    /// Set when the first execution happens
    pub fn with_first_run(mut self, first_run: FirstRun) -> Self {
        self.first_run = first_run;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the repeating loop; no-op if already running
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!(scheduler = self.name, "Scheduler already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.name,
            self.interval,
            self.first_run,
            Arc::clone(&self.work),
            Arc::clone(&self.on_error),
            cancel.clone(),
        ));

        info!(
            scheduler = self.name,
            interval_ms = self.interval.as_millis() as u64,
            "Scheduler started"
        );
        *running = Some(Running { cancel, handle });
    }

    /// Signal cancellation and wait for the in-flight cycle to finish
    ///
    /// After this returns no further executions occur. No-op if not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            error!(scheduler = self.name, "Scheduler loop ended abnormally: {}", e);
        }

        info!(scheduler = self.name, "Scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

async fn run_loop(
    name: &'static str,
    interval: Duration,
    first_run: FirstRun,
    work: Arc<dyn PeriodicWork>,
    on_error: Arc<dyn CycleErrorHandler>,
    cancel: CancellationToken,
) {
    if first_run == FirstRun::AfterInterval && !wait_for_tick(interval, &cancel).await {
        return;
    }

    loop {
        debug!(scheduler = name, "Cycle started");

        let cycle = tokio::spawn({
            let work = Arc::clone(&work);
            async move { work.run().await }
        });

        let outcome = match cycle.await {
            Ok(result) => result,
            Err(join_err) => Err(Error::scheduler(format!(
                "{} cycle aborted: {}",
                name, join_err
            ))),
        };

        if let Err(e) = outcome {
            warn!(scheduler = name, "Cycle failed: {}", e);
            on_error.handle(e).await;
        }

        if !wait_for_tick(interval, &cancel).await {
            break;
        }
    }

    debug!(scheduler = name, "Scheduler loop exited");
}

/// Wait up to `interval`; returns `false` if cancelled first
async fn wait_for_tick(interval: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicWork for Counting {
        async fn run(&self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::router("unreachable"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct Collecting {
        errors: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CycleErrorHandler for Arc<Collecting> {
        async fn handle(&self, error: Error) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn scheduler(
        interval_ms: u64,
        fail: bool,
    ) -> (PeriodicScheduler, Arc<AtomicUsize>, Arc<Collecting>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(Collecting::default());
        let scheduler = PeriodicScheduler::new(
            "test",
            Duration::from_millis(interval_ms),
            Arc::new(Counting {
                runs: Arc::clone(&runs),
                fail,
            }),
            Arc::new(Arc::clone(&errors)),
        );
        (scheduler, runs, errors)
    }

    #[tokio::test]
    async fn test_runs_immediately_and_repeats() {
        let (scheduler, runs, _) = scheduler(20, false);
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(110)).await;
        scheduler.stop().await;

        assert!(runs.load(Ordering::SeqCst) >= 3);
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (scheduler, runs, _) = scheduler(10_000, false);
        scheduler.start().await;
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_after_interval_delays_first_run() {
        let (scheduler, runs, _) = scheduler(10_000, false);
        let scheduler = scheduler.with_first_run(FirstRun::AfterInterval);
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_reach_handler_and_loop_continues() {
        let (scheduler, runs, errors) = scheduler(10, true);
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.stop().await;

        let run_count = runs.load(Ordering::SeqCst);
        assert!(run_count >= 2);
        let errors = errors.errors.lock().unwrap();
        assert_eq!(errors.len(), run_count);
        assert!(errors[0].contains("unreachable"));
    }

    #[tokio::test]
    async fn test_stop_right_after_start_still_runs_once() {
        let (scheduler, runs, _) = scheduler(3_600_000, false);
        scheduler.start().await;
        scheduler.stop().await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_running().await);
    }

    struct Overlapping {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PeriodicWork for Arc<Overlapping> {
        async fn run(&self) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(40)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_work_never_overlaps() {
        let work = Arc::new(Overlapping {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            runs: AtomicUsize::new(0),
        });
        let scheduler = PeriodicScheduler::new(
            "overlap",
            Duration::from_millis(5),
            Arc::new(Arc::clone(&work)),
            Arc::new(Arc::new(Collecting::default())),
        );

        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.stop().await;

        assert!(work.runs.load(Ordering::SeqCst) >= 2);
        assert_eq!(work.peak.load(Ordering::SeqCst), 1);
        assert_eq!(work.in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let (scheduler, runs, _) = scheduler(10, false);
        scheduler.stop().await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
