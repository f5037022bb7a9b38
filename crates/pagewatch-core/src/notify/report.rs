//! Batched report body

use chrono::{Local, NaiveDateTime};

/// Timestamp layout used in the report header
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the report body from transition messages
///
/// ```text
/// Watch report (2025-01-09 12:00:00)
///
/// <message 1>
///
/// <message 2>
/// ```
pub fn format_report<S: AsRef<str>>(messages: &[S], timestamp: NaiveDateTime) -> String {
    let mut body = format!("Watch report ({})", timestamp.format(TIMESTAMP_FORMAT));
    for message in messages {
        body.push_str("\n\n");
        body.push_str(message.as_ref());
    }
    body
}

/// [`format_report`] stamped with the local wall clock
pub fn format_report_now<S: AsRef<str>>(messages: &[S]) -> String {
    format_report(messages, Local::now().naive_local())
}
