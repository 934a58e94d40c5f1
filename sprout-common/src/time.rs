//! Timestamp utilities
//!
//! All timestamps are UTC and stored in the database as RFC3339 text.

use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for TEXT column storage
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Parse a timestamp from TEXT column storage
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", s, e)))
}

/// Parse an optional timestamp column
pub fn from_db_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    s.map(from_db).transpose()
}
