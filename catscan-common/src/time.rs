//! Timestamp utilities
//!
//! Timestamps are persisted as RFC 3339 text in UTC.

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db).transpose()
}

/// Calendar day (UTC) a timestamp falls on
pub fn utc_day(ts: &DateTime<Utc>) -> NaiveDate {
    ts.date_naive()
}
