//! Outage interval derivation
//!
//! [`OutageIntervalBuilder`] runs an ordered sequence of log entries through
//! a small per-protocol state machine in a single forward pass:
//!
//! - a planned hint marks the next disconnect of the targeted protocol(s)
//! - a disconnect opens an interval (or folds into the one already open)
//! - a connect closes the open interval; without one it is noise
//! - intervals still open after the scan are emitted without an end
//!
//! Intervals are emitted in the order their closing event (or the end of
//! the scan) is processed.

use crate::classifier::{LogAction, LogClassifier};
use crate::model::{clamped_duration_seconds, LogEntry, OutageInterval, OutageStatus, Protocol};
use chrono::NaiveDateTime;
use tracing::trace;

/// Interval currently open for one protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenInterval {
    start: NaiveDateTime,
    start_entry_id: u64,
    planned: bool,
}

/// Per-protocol state for one builder run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ProtocolState {
    open: Option<OpenInterval>,
    pending_planned: bool,
}

/// Derives outage intervals from classified log entries
#[derive(Debug, Clone, Default)]
pub struct OutageIntervalBuilder {
    classifier: LogClassifier,
}

impl OutageIntervalBuilder {
    pub fn new(classifier: LogClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &LogClassifier {
        &self.classifier
    }

    /// Build intervals from entries in timestamp order
    ///
    /// Entries without a timestamp or message are skipped.
    pub fn build(&self, entries: &[LogEntry]) -> Vec<OutageInterval> {
        let mut states = [ProtocolState::default(); 2];
        let mut intervals = Vec::new();

        for entry in entries {
            let (Some(timestamp), Some(message)) = (entry.timestamp, entry.message.as_deref())
            else {
                continue;
            };

            let classification = self.classifier.classify(message);

            match classification.action {
                LogAction::PlannedHint => {
                    for protocol in classification.scope.protocols() {
                        states[protocol.index()].pending_planned = true;
                    }
                }
                LogAction::Disconnect => {
                    for protocol in classification.scope.protocols() {
                        let state = &mut states[protocol.index()];
                        let pending = std::mem::take(&mut state.pending_planned);
                        match state.open.as_mut() {
                            Some(open) => open.planned |= pending,
                            None => {
                                state.open = Some(OpenInterval {
                                    start: timestamp,
                                    start_entry_id: entry.id,
                                    planned: pending,
                                });
                            }
                        }
                    }
                }
                LogAction::Connect => {
                    for &protocol in classification.scope.protocols() {
                        let state = &mut states[protocol.index()];
                        let Some(open) = state.open.take() else {
                            trace!(entry_id = entry.id, %protocol, "Connect without open interval");
                            continue;
                        };
                        *state = ProtocolState::default();

                        intervals.push(OutageInterval {
                            protocol,
                            start_time: open.start,
                            end_time: Some(timestamp),
                            duration_seconds: Some(clamped_duration_seconds(open.start, timestamp)),
                            status: if open.planned {
                                OutageStatus::Planned
                            } else {
                                OutageStatus::Closed
                            },
                            start_log_entry_id: Some(open.start_entry_id),
                            end_log_entry_id: Some(entry.id),
                        });
                    }
                }
                LogAction::Ignore => {}
            }
        }

        for protocol in Protocol::ALL {
            if let Some(open) = states[protocol.index()].open {
                intervals.push(OutageInterval {
                    protocol,
                    start_time: open.start,
                    end_time: None,
                    duration_seconds: None,
                    status: if open.planned {
                        OutageStatus::PlannedOpen
                    } else {
                        OutageStatus::Open
                    },
                    start_log_entry_id: Some(open.start_entry_id),
                    end_log_entry_id: None,
                });
            }
        }

        intervals
    }
}
