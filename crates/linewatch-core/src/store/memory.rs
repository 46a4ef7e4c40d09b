// # Memory Store
//
// In-memory implementation of StatusStore, LogStore and OutageStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for running the tracker without a data directory.
//
// ## Crash Behavior
//
// - All status events, log entries and outages are lost on restart
// - The first log sync after a restart re-ingests whatever the router
//   still holds in its event log

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{
    ConnectionStatus, LogEntry, OutageInterval, OutageRecord, OutageStatus, RawLogLine,
    StatusEvent,
};
use crate::store::data::StoreData;
use crate::traits::{LogStore, OutageStore, StatusStore};

/// In-memory store implementation
///
/// All three record sets live behind one RwLock, so replacing the
/// calculated outage set is atomic with respect to concurrent readers.
///
/// # Example
///
/// ```rust,no_run
/// use linewatch_core::store::MemoryStore;
/// use linewatch_core::traits::StatusStore;
/// use linewatch_core::model::ConnectionStatus;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStore::new();
///
///     store
///         .record_event(ConnectionStatus::Online, chrono::Utc::now(), serde_json::json!({}))
///         .await?;
///
///     let latest = store.latest_event().await?;
///     assert_eq!(latest.map(|e| e.status), Some(ConnectionStatus::Online));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreData>>,
}

impl MemoryStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn record_event(
        &self,
        status: ConnectionStatus,
        timestamp: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<StatusEvent, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.record_event(status, timestamp, details))
    }

    async fn latest_event(&self) -> Result<Option<StatusEvent>, Error> {
        Ok(self.inner.read().await.latest_event())
    }

    async fn list_events(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, Error> {
        Ok(self.inner.read().await.list_events(start, end))
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn ingest_entries(&self, entries: &[RawLogLine], source: &str) -> Result<usize, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.ingest_entries(entries, source))
    }

    async fn list_entries(
        &self,
        limit: Option<usize>,
        ascending: bool,
    ) -> Result<Vec<LogEntry>, Error> {
        Ok(self.inner.read().await.list_entries(limit, ascending))
    }
}

#[async_trait]
impl OutageStore for MemoryStore {
    async fn replace_calculated_outages(&self, intervals: &[OutageInterval]) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.replace_calculated_outages(intervals);
        Ok(())
    }

    async fn list_outages(&self) -> Result<Vec<OutageRecord>, Error> {
        Ok(self.inner.read().await.list_outages())
    }

    async fn create_manual_outage(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        status: OutageStatus,
    ) -> Result<u64, Error> {
        let mut guard = self.inner.write().await;
        guard.create_manual_outage(start, end, status)
    }
}
