use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::models::{DayCount, Visitor};
use crate::storage::{is_valid_visitor_id, Storage, StorageError, StorageResult};

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS day_counts (
                day TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visitors (
                visitor_id TEXT PRIMARY KEY,
                first_seen INTEGER NOT NULL,
                last_visit INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_last_visit ON visitors(last_visit)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn record_view(&self, day: NaiveDate) -> StorageResult<i64> {
        let day = day.format("%Y-%m-%d").to_string();

        // Single-statement upsert so concurrent increments on the same day
        // never lose updates.
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO day_counts (day, count)
            VALUES (?, 1)
            ON CONFLICT(day) DO UPDATE SET count = day_counts.count + 1
            RETURNING count
            "#,
        )
        .bind(&day)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(StorageError::Unavailable)?;

        Ok(count)
    }

    async fn views_on(&self, day: NaiveDate) -> Result<i64> {
        let day = day.format("%Y-%m-%d").to_string();

        let bucket = sqlx::query_as::<_, DayCount>(
            r#"
            SELECT day, count FROM day_counts
            WHERE day = ?
            "#,
        )
        .bind(&day)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(bucket.map(|b| b.count).unwrap_or(0))
    }

    async fn upsert_visitor(&self, visitor_id: &str, now: i64) -> StorageResult<(Visitor, bool)> {
        if !is_valid_visitor_id(visitor_id) {
            return Err(StorageError::InvalidIdentifier);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO visitors (visitor_id, first_seen, last_visit)
            VALUES (?, ?, ?)
            ON CONFLICT(visitor_id) DO NOTHING
            "#,
        )
        .bind(visitor_id)
        .bind(now)
        .bind(now)
        .execute(self.pool.as_ref())
        .await
        .map_err(StorageError::Unavailable)?;

        let is_new = result.rows_affected() > 0;

        if !is_new {
            sqlx::query(
                r#"
                UPDATE visitors
                SET last_visit = ?
                WHERE visitor_id = ?
                "#,
            )
            .bind(now)
            .bind(visitor_id)
            .execute(self.pool.as_ref())
            .await
            .map_err(StorageError::Unavailable)?;
        }

        let visitor = sqlx::query_as::<_, Visitor>(
            r#"
            SELECT visitor_id, first_seen, last_visit
            FROM visitors
            WHERE visitor_id = ?
            "#,
        )
        .bind(visitor_id)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(StorageError::Unavailable)?;

        Ok((visitor, is_new))
    }

    async fn visitor_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM visitors")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}
