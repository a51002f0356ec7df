//! Log record formatting
//!
//! Every emitted line becomes `"<YYYY-MM-DD HH:MM:SS> - <line>\n"`. The same
//! string goes to the console, the log file and every subscriber.

use chrono::{Local, NaiveDateTime};

/// strftime pattern for the record timestamp (second precision, local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Separator between the timestamp and the line content
pub const SEPARATOR: &str = " - ";

/// Length of a rendered timestamp (`YYYY-MM-DD HH:MM:SS`)
const TIMESTAMP_LEN: usize = 19;

/// Whether a line carries no content once surrounding whitespace is stripped
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Render a record for `line` stamped with `at`
pub fn format_record(at: &NaiveDateTime, line: &str) -> String {
    format!("{}{}{}\n", at.format(TIMESTAMP_FORMAT), SEPARATOR, line)
}

/// Render a record for `line` stamped with the current local time
pub fn stamp(line: &str) -> String {
    format_record(&Local::now().naive_local(), line)
}

/// Split a record back into its timestamp and content
///
/// Returns `None` if the record does not follow the record format.
pub fn parse_record(record: &str) -> Option<(NaiveDateTime, &str)> {
    let record = record.strip_suffix('\n')?;
    let timestamp = record.get(..TIMESTAMP_LEN)?;
    let content = record.get(TIMESTAMP_LEN..)?.strip_prefix(SEPARATOR)?;
    let at = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Some((at, content))
}
