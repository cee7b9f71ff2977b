//! Timestamp helpers for persisted records

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp the way it is persisted: RFC 3339, UTC, whole seconds
#[must_use]
pub fn format_rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an RFC 3339 timestamp with any offset into UTC
pub fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(input).map(|t| t.with_timezone(&Utc))
}
