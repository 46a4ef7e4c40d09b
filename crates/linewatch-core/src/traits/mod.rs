//! Core traits for the linewatch system
//!
//! This module defines the seams between the core and its collaborators.
//!
//! - [`RouterClient`]: Live status and raw device log from the router
//! - [`StatusStore`]: Append-only connectivity status events
//! - [`LogStore`]: Deduplicated device log entries
//! - [`OutageStore`]: Calculated and manual outage intervals

pub mod router_client;
pub mod status_store;
pub mod log_store;
pub mod outage_store;

pub use router_client::{RouterClient, RouterStatus};
pub use status_store::StatusStore;
pub use log_store::LogStore;
pub use outage_store::OutageStore;
