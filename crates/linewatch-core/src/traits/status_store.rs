// # Status Store Trait
//
// Append-only log of connectivity status events.
//
// The tracker reads `latest_event()` before every write so that repeated
// identical polls never produce duplicate rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{ConnectionStatus, StatusEvent};

/// Trait for status event storage
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Append a status event and return it with its assigned id
    async fn record_event(
        &self,
        status: ConnectionStatus,
        timestamp: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Result<StatusEvent, crate::Error>;

    /// The most recently stored event, by timestamp
    async fn latest_event(&self) -> Result<Option<StatusEvent>, crate::Error>;

    /// Events within `[start, end]` in ascending timestamp order
    async fn list_events(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<StatusEvent>, crate::Error>;
}
