//! Timestamp helpers
//!
//! Timestamps travel through the core as i64 Unix nanoseconds (UTC) and are
//! rendered to RFC 3339 only at the wire edges.

use chrono::{DateTime, Utc};

/// Current wall-clock time as Unix nanoseconds
pub fn now_nanos() -> i64 {
    Utc::now()
        .timestamp_nanos_opt()
        .expect("current time fits in i64 nanos until 2262")
}

/// Render Unix nanoseconds as an RFC 3339 UTC string
pub fn to_rfc3339(nanos: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339()
}
