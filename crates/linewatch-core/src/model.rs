//! Domain types shared by the classifier, the interval builder, the stores
//! and the tracker.
//!
//! Log and outage timestamps are the router's local wall-clock time and are
//! kept as [`NaiveDateTime`]. Status events are stamped by this process and
//! use [`DateTime<Utc>`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two independently tracked network layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ipv4,
    Ipv6,
}

impl Protocol {
    /// Both protocols, in the order trailing intervals are emitted
    pub const ALL: [Protocol; 2] = [Protocol::Ipv4, Protocol::Ipv6];

    /// Index into per-protocol arrays
    pub const fn index(self) -> usize {
        match self {
            Protocol::Ipv4 => 0,
            Protocol::Ipv6 => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ipv4 => "ipv4",
            Protocol::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log line as returned by the router, already split into its fields
///
/// `timestamp` and `message` are absent when the line did not match the
/// `DD.MM.YY HH:MM:SS message` grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogLine {
    pub timestamp: Option<NaiveDateTime>,
    pub message: Option<String>,
    pub raw: String,
}

/// A persisted device log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic identity assigned by the store
    pub id: u64,
    /// Absent when the original line failed to parse
    pub timestamp: Option<NaiveDateTime>,
    pub message: Option<String>,
    pub raw: String,
    pub source: String,
}

/// Lifecycle status of an outage interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutageStatus {
    /// Disconnect seen, no reconnect yet
    Open,
    /// Disconnect followed by reconnect
    Closed,
    /// Closed interval announced by a planned-outage hint
    Planned,
    /// Open interval announced by a planned-outage hint
    PlannedOpen,
    /// Entered by hand, never produced by the builder
    Manual,
}

impl OutageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutageStatus::Open => "open",
            OutageStatus::Closed => "closed",
            OutageStatus::Planned => "planned",
            OutageStatus::PlannedOpen => "planned-open",
            OutageStatus::Manual => "manual",
        }
    }
}

impl fmt::Display for OutageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a stored outage row came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutageSource {
    Calculated,
    Manual,
}

/// An outage interval derived from the device log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageInterval {
    pub protocol: Protocol,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    /// Present iff `end_time` is present, never below 1
    pub duration_seconds: Option<i64>,
    pub status: OutageStatus,
    pub start_log_entry_id: Option<u64>,
    pub end_log_entry_id: Option<u64>,
}

/// A stored outage row, calculated or manual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutageRecord {
    pub id: u64,
    /// Absent for manual rows
    pub protocol: Option<Protocol>,
    pub start_time: NaiveDateTime,
    pub end_time: Option<NaiveDateTime>,
    pub duration_seconds: Option<i64>,
    pub status: OutageStatus,
    pub source: OutageSource,
    pub start_log_entry_id: Option<u64>,
    pub end_log_entry_id: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Duration between two instants in whole seconds, clamped to at least 1
pub fn clamped_duration_seconds(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    let millis = end.signed_duration_since(start).num_milliseconds();
    let rounded = (millis as f64 / 1000.0).round() as i64;
    rounded.max(1)
}

/// Connectivity status recorded in the status event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    Offline,
    Error,
}

impl ConnectionStatus {
    pub fn from_connected(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Online => "online",
            ConnectionStatus::Offline => "offline",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only status event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub status: ConnectionStatus,
    /// Opaque payload: router details or the failing cycle and its message
    pub details: serde_json::Value,
}
