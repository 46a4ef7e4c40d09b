// # Outage Store Trait
//
// Stores outage intervals from two sources:
//
// - **calculated**: produced by the interval builder; the whole set is
//   replaced atomically on every log sync
// - **manual**: inserted one at a time; never touched by recomputation

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::model::{OutageInterval, OutageRecord, OutageStatus};

/// Trait for outage storage
#[async_trait]
pub trait OutageStore: Send + Sync {
    /// Replace every calculated row with `intervals`
    ///
    /// All-or-nothing: on error the previously stored calculated set is
    /// left untouched. Manual rows are never modified.
    async fn replace_calculated_outages(
        &self,
        intervals: &[OutageInterval],
    ) -> Result<(), crate::Error>;

    /// All outages ordered by start time ascending
    async fn list_outages(&self) -> Result<Vec<OutageRecord>, crate::Error>;

    /// Insert a manual outage and return its id
    ///
    /// The duration is derived from `start`/`end` when `end` is present.
    /// `end` must be strictly after `start`.
    async fn create_manual_outage(
        &self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        status: OutageStatus,
    ) -> Result<u64, crate::Error>;
}
