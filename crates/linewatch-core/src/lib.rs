// # linewatch-core
//
// Core library for tracking internet line outages from a home router.
//
// ## Architecture Overview
//
// - **RouterClient**: Trait for live status and the raw device event log
// - **StatusStore / LogStore / OutageStore**: Traits for the three record sets
// - **LogClassifier**: Keyword-driven, ordered classification of log messages
// - **OutageIntervalBuilder**: Derives per-protocol outage intervals from the log
// - **PeriodicScheduler**: Fixed-interval executor with per-cycle error isolation
// - **ConnectionTracker**: Owns the status-poll and log-sync schedulers
//
// ## Design Principles
//
// 1. **Explicit assembly**: Callers build stores, builder and tracker once and inject them
// 2. **Failures are data**: A failed cycle becomes an `error` status event, never a crash
// 3. **Idempotent ingest**: Re-reading the router log never duplicates entries
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod classifier;
pub mod config;
pub mod error;
pub mod log_line;
pub mod model;
pub mod outage;
pub mod scheduler;
pub mod store;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use classifier::{KeywordSets, LogClassifier};
pub use config::{LinewatchConfig, RouterConfig, StoreConfig, TrackerConfig};
pub use error::{Error, Result};
pub use outage::OutageIntervalBuilder;
pub use scheduler::PeriodicScheduler;
pub use store::{FileStore, MemoryStore};
pub use tracker::{ConnectionTracker, TrackerEvent};
pub use traits::{LogStore, OutageStore, RouterClient, RouterStatus, StatusStore};
