use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Aggregate view count for one local calendar day.
///
/// `day` is the ISO-8601 date (`YYYY-MM-DD`) of the bucket, derived from
/// wall-clock local time truncated to midnight.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DayCount {
    pub day: String,
    pub count: i64,
}

/// A distinct visitor, keyed by the opaque identifier carried in the
/// long-lived cookie. Timestamps are Unix epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Visitor {
    pub visitor_id: String,
    pub first_seen: i64,
    pub last_visit: i64,
}
