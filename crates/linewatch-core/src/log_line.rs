//! Router event log grammar
//!
//! Every line of the device log has the shape `DD.MM.YY HH:MM:SS message`.
//! Lines that do not match are kept with their raw text only so that the
//! store can still account for them.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::model::RawLogLine;

const TIMESTAMP_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// `DD.MM.YY`, `HH:MM:SS` and a non-empty message, whitespace separated
const LOG_LINE_PATTERN: &str = r"^(\d{2}\.\d{2}\.\d{2})\s+(\d{2}:\d{2}:\d{2})\s+(.+)$";

static LOG_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(LOG_LINE_PATTERN).expect("valid regex"));

/// Split a device log blob into parsed lines, dropping blank lines
pub fn parse_device_log(blob: &str) -> Vec<RawLogLine> {
    blob.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(parse_log_line)
        .collect()
}

/// Parse a single log line
///
/// A line whose date/time fields have the right shape but describe an
/// impossible instant (e.g. `31.02.24`) keeps its message and loses only
/// the timestamp.
pub fn parse_log_line(line: &str) -> RawLogLine {
    let line = line.trim();

    let Some((date, time, message)) = split_fields(line) else {
        return RawLogLine {
            timestamp: None,
            message: None,
            raw: line.to_string(),
        };
    };

    let timestamp =
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), TIMESTAMP_FORMAT).ok();

    RawLogLine {
        timestamp,
        message: Some(message.to_string()),
        raw: line.to_string(),
    }
}

fn split_fields(line: &str) -> Option<(&str, &str, &str)> {
    let caps = LOG_LINE_RE.captures(line)?;
    let (_, [date, time, message]) = caps.extract();
    Some((date, time, message))
}
