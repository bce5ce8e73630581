use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::Visitor;

/// Longest visitor identifier accepted from a cookie.
pub const MAX_VISITOR_ID_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("visitor identifier is empty or malformed")]
    InvalidIdentifier,
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Returns true when `id` is acceptable as a visitor identifier: non-empty,
/// bounded length, and restricted to cookie-safe characters.
pub fn is_valid_visitor_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VISITOR_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn init(&self) -> Result<()>;

    /// Atomically find-or-create the bucket for `day` and increment it by 1.
    /// Returns the post-increment count. Safe under concurrent callers for
    /// the same day; never touches any other day's bucket.
    async fn record_view(&self, day: NaiveDate) -> StorageResult<i64>;

    /// View count for `day`, or 0 when no bucket exists. A missing day is
    /// never an error.
    async fn views_on(&self, day: NaiveDate) -> Result<i64>;

    /// Insert the visitor if absent, otherwise update its `last_visit`.
    /// Returns the stored record and whether it was newly created.
    /// Rejects malformed identifiers with [`StorageError::InvalidIdentifier`].
    async fn upsert_visitor(&self, visitor_id: &str, now: i64) -> StorageResult<(Visitor, bool)>;

    /// Total number of visitor records ever created.
    async fn visitor_count(&self) -> Result<i64>;
}
