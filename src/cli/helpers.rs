//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use chrono::{DateTime, Local, Utc};

use crate::core::record::parse_loose_date;

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Counts characters rather than bytes so Thai text never splits inside a
/// code point.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Local `YYYY-MM-DD HH:MM`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = ts.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M").to_string()
}

/// Normalize a free-text date when it parses, otherwise show it verbatim
pub fn format_loose_date(text: &str) -> String {
    match parse_loose_date(text) {
        Some(ts) => format_timestamp(&ts),
        None => text.to_string(),
    }
}

/// Best available date for an item: structured timestamp, then free text
pub fn format_item_date(created_at: Option<&DateTime<Utc>>, date: Option<&str>) -> String {
    match (created_at, date) {
        (Some(ts), _) => format_timestamp(ts),
        (None, Some(text)) => format_loose_date(text),
        (None, None) => "-".to_string(),
    }
}
