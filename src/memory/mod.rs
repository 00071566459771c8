pub mod forget;
pub mod search;
pub mod stats;
pub mod store;
pub mod types;

use chrono::{SecondsFormat, Utc};

/// Canonical form of a tag: trimmed and lowercased. Returns `None` for tags
/// that are empty after trimming.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let tag = tag.trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_lowercase())
    }
}

/// Current UTC time in the same shape the schema default produces
/// (`2024-01-01T00:00:00.000Z`), so text order is chronological order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
