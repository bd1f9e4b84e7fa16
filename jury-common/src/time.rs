//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch seconds (JWT `iat` / `exp`)
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}
