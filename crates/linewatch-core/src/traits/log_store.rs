// # Log Store Trait
//
// Persists raw device log entries fetched from the router.
//
// ## Uniqueness
//
// Entries are unique on `(timestamp, message)`. Ingesting the same line
// twice is a no-op, not an error. Lines without a timestamp are stored
// with their raw text (unique on that text) but are never returned by
// `list_entries`.

use async_trait::async_trait;

use crate::model::{LogEntry, RawLogLine};

/// Trait for device log storage
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Insert entries, ignoring duplicates
    ///
    /// # Returns
    ///
    /// - `Ok(usize)`: Number of newly inserted entries
    /// - `Err(Error)`: Storage error; nothing from this batch was stored
    async fn ingest_entries(&self, entries: &[RawLogLine], source: &str)
    -> Result<usize, crate::Error>;

    /// Timestamped entries ordered by `(timestamp, id)`
    ///
    /// # Parameters
    ///
    /// - `limit`: Maximum number of entries, taken from the start of the ordering
    /// - `ascending`: Oldest first when `true`, newest first otherwise
    async fn list_entries(
        &self,
        limit: Option<usize>,
        ascending: bool,
    ) -> Result<Vec<LogEntry>, crate::Error>;
}
