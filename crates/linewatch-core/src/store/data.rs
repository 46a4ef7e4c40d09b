// # Store Data
//
// The three record sets shared by the memory and file stores, plus the
// pure operations on them. Callers provide locking; the file store also
// provides durability.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::Error;
use crate::model::{
    clamped_duration_seconds, ConnectionStatus, LogEntry, OutageInterval, OutageRecord,
    OutageSource, OutageStatus, RawLogLine, StatusEvent,
};

/// Uniqueness key of a log entry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LogKey {
    Timed(NaiveDateTime, String),
    Untimed(String),
}

impl LogKey {
    fn of(timestamp: Option<NaiveDateTime>, message: Option<&str>, raw: &str) -> Self {
        match (timestamp, message) {
            (Some(ts), Some(msg)) => LogKey::Timed(ts, msg.to_string()),
            _ => LogKey::Untimed(raw.to_string()),
        }
    }
}

/// All persisted records
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    #[serde(default)]
    status_events: Vec<StatusEvent>,
    #[serde(default)]
    log_entries: Vec<LogEntry>,
    #[serde(default)]
    outages: Vec<OutageRecord>,
    #[serde(default)]
    last_status_id: u64,
    #[serde(default)]
    last_log_id: u64,
    #[serde(default)]
    last_outage_id: u64,
    #[serde(skip)]
    log_keys: HashSet<LogKey>,
}

impl StoreData {
    /// Rebuild derived indexes after deserialization
    pub(crate) fn reindex(&mut self) {
        self.log_keys = self
            .log_entries
            .iter()
            .map(|e| LogKey::of(e.timestamp, e.message.as_deref(), &e.raw))
            .collect();
    }

    pub(crate) fn record_event(
        &mut self,
        status: ConnectionStatus,
        timestamp: DateTime<Utc>,
        details: serde_json::Value,
    ) -> StatusEvent {
        self.last_status_id += 1;
        let event = StatusEvent {
            id: self.last_status_id,
            timestamp,
            status,
            details,
        };
        self.status_events.push(event.clone());
        event
    }

    pub(crate) fn latest_event(&self) -> Option<StatusEvent> {
        self.status_events
            .iter()
            .max_by_key(|e| (e.timestamp, e.id))
            .cloned()
    }

    pub(crate) fn list_events(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<StatusEvent> {
        let mut events: Vec<StatusEvent> = self
            .status_events
            .iter()
            .filter(|e| start.is_none_or(|s| e.timestamp >= s))
            .filter(|e| end.is_none_or(|until| e.timestamp <= until))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.timestamp, e.id));
        events
    }

    pub(crate) fn ingest_entries(&mut self, entries: &[RawLogLine], source: &str) -> usize {
        let mut inserted = 0;

        for line in entries {
            let key = LogKey::of(line.timestamp, line.message.as_deref(), &line.raw);
            if !self.log_keys.insert(key) {
                continue;
            }

            self.last_log_id += 1;
            self.log_entries.push(LogEntry {
                id: self.last_log_id,
                timestamp: line.timestamp,
                message: line.message.clone(),
                raw: line.raw.clone(),
                source: source.to_string(),
            });
            inserted += 1;
        }

        inserted
    }

    pub(crate) fn list_entries(&self, limit: Option<usize>, ascending: bool) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = self
            .log_entries
            .iter()
            .filter(|e| e.timestamp.is_some() && e.message.is_some())
            .cloned()
            .collect();

        entries.sort_by_key(|e| (e.timestamp, e.id));
        if !ascending {
            entries.reverse();
        }
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        entries
    }

    pub(crate) fn replace_calculated_outages(&mut self, intervals: &[OutageInterval]) {
        let now = Utc::now();
        self.outages.retain(|o| o.source == OutageSource::Manual);

        for interval in intervals {
            self.last_outage_id += 1;
            self.outages.push(OutageRecord {
                id: self.last_outage_id,
                protocol: Some(interval.protocol),
                start_time: interval.start_time,
                end_time: interval.end_time,
                duration_seconds: interval.duration_seconds,
                status: interval.status,
                source: OutageSource::Calculated,
                start_log_entry_id: interval.start_log_entry_id,
                end_log_entry_id: interval.end_log_entry_id,
                created_at: now,
                updated_at: now,
            });
        }
    }

    pub(crate) fn list_outages(&self) -> Vec<OutageRecord> {
        let mut outages = self.outages.clone();
        outages.sort_by_key(|o| (o.start_time, o.id));
        outages
    }

    pub(crate) fn create_manual_outage(
        &mut self,
        start: NaiveDateTime,
        end: Option<NaiveDateTime>,
        status: OutageStatus,
    ) -> Result<u64, Error> {
        if let Some(end) = end
            && end <= start
        {
            return Err(Error::invalid_input(format!(
                "Outage end {} must be after start {}",
                end, start
            )));
        }

        let now = Utc::now();
        self.last_outage_id += 1;
        self.outages.push(OutageRecord {
            id: self.last_outage_id,
            protocol: None,
            start_time: start,
            end_time: end,
            duration_seconds: end.map(|end| clamped_duration_seconds(start, end)),
            status,
            source: OutageSource::Manual,
            start_log_entry_id: None,
            end_log_entry_id: None,
            created_at: now,
            updated_at: now,
        });

        Ok(self.last_outage_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_line::parse_log_line;

    #[test]
    fn test_reindex_restores_dedup() {
        let mut data = StoreData::default();
        let line = parse_log_line("01.01.24 10:00:00 Internetverbindung wurde getrennt.");
        assert_eq!(data.ingest_entries(std::slice::from_ref(&line), "test"), 1);

        let json = serde_json::to_string(&data).unwrap();
        let mut restored: StoreData = serde_json::from_str(&json).unwrap();
        restored.reindex();

        assert_eq!(restored.ingest_entries(&[line], "test"), 0);
        assert_eq!(restored.list_entries(None, true).len(), 1);
    }

    #[test]
    fn test_untimed_lines_dedup_on_raw() {
        let mut data = StoreData::default();
        let line = parse_log_line("not a log line");
        assert_eq!(data.ingest_entries(&[line.clone(), line], "test"), 1);
        assert!(data.list_entries(None, true).is_empty());
    }
}
