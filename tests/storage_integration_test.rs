//! Integration tests for the storage layer
//!
//! These tests cover the daily view counters and the visitor registry,
//! including the concurrency guarantees for same-day increments.
//!
//! Tests run against in-memory SQLite and can be skipped with
//! `DATABASE_BACKEND=postgres cargo test` when only the PostgreSQL
//! deployment is of interest.

use chrono::NaiveDate;
use std::sync::Arc;
use tally::storage::{SqliteStorage, Storage, StorageError};

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[tokio::test]
async fn test_record_view_creates_bucket_lazily() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;
    let d = day("2024-06-01");

    assert_eq!(storage.views_on(d).await.unwrap(), 0);
    assert_eq!(storage.record_view(d).await.unwrap(), 1);
    assert_eq!(storage.record_view(d).await.unwrap(), 2);
    assert_eq!(storage.views_on(d).await.unwrap(), 2);
}

#[tokio::test]
async fn test_views_on_missing_day_is_zero() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;

    // A day nobody ever incremented reads as zero, not as an error
    assert_eq!(storage.views_on(day("1999-12-31")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_increment_never_touches_other_days() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;
    let d1 = day("2024-06-01");
    let d2 = day("2024-06-02");

    for _ in 0..5 {
        storage.record_view(d1).await.unwrap();
    }
    storage.record_view(d2).await.unwrap();
    storage.record_view(d2).await.unwrap();

    assert_eq!(storage.views_on(d1).await.unwrap(), 5);
    assert_eq!(storage.views_on(d2).await.unwrap(), 2);
    // The day before either bucket stays empty
    assert_eq!(storage.views_on(day("2024-05-31")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_increments_same_day() {
    if !should_test_backend("sqlite") {
        return;
    }

    // Test that concurrent increments on the same day never lose updates
    let storage = create_sqlite_storage().await;
    let d = day("2024-06-01");

    let mut handles = vec![];
    for _ in 0..10 {
        let storage_clone = Arc::clone(&storage);
        let handle = tokio::spawn(async move {
            for _ in 0..10 {
                storage_clone.record_view(d).await.unwrap();
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(storage.views_on(d).await.unwrap(), 100);
}

#[tokio::test]
async fn test_record_view_returns_post_increment_count() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;
    let d = day("2024-06-01");

    let mut handles = vec![];
    for _ in 0..20 {
        let storage_clone = Arc::clone(&storage);
        handles.push(tokio::spawn(
            async move { storage_clone.record_view(d).await },
        ));
    }

    let mut counts = vec![];
    for handle in handles {
        counts.push(handle.await.unwrap().unwrap());
    }

    // Every caller saw a distinct post-increment value
    counts.sort_unstable();
    assert_eq!(counts, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_visitor_upsert_lifecycle() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;

    let (visitor, is_new) = storage.upsert_visitor("abc", 1_000).await.unwrap();
    assert!(is_new);
    assert_eq!(visitor.visitor_id, "abc");
    assert_eq!(visitor.first_seen, 1_000);
    assert_eq!(visitor.last_visit, 1_000);

    // Second upsert updates last_visit without creating a second record
    let (visitor, is_new) = storage.upsert_visitor("abc", 1_120).await.unwrap();
    assert!(!is_new);
    assert_eq!(visitor.first_seen, 1_000);
    assert_eq!(visitor.last_visit, 1_120);

    assert_eq!(storage.visitor_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_visitor_count_tracks_distinct_identifiers() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;

    for id in ["a", "b", "c"] {
        storage.upsert_visitor(id, 1_000).await.unwrap();
    }
    storage.upsert_visitor("a", 2_000).await.unwrap();

    assert_eq!(storage.visitor_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_upsert_rejects_malformed_identifiers() {
    if !should_test_backend("sqlite") {
        return;
    }

    let storage = create_sqlite_storage().await;

    for bad in ["", "has space", "semi;colon"] {
        match storage.upsert_visitor(bad, 1_000).await {
            Err(StorageError::InvalidIdentifier) => {}
            other => panic!("Expected InvalidIdentifier for {:?}, got {:?}", bad, other.is_ok()),
        }
    }

    // Nothing was recorded for the rejected identifiers
    assert_eq!(storage.visitor_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_upserts_same_visitor() {
    if !should_test_backend("sqlite") {
        return;
    }

    // Concurrent upserts for the same id must not corrupt the record or
    // create duplicates
    let storage = create_sqlite_storage().await;

    let mut handles = vec![];
    for _ in 0..10 {
        let storage_clone = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage_clone.upsert_visitor("abc", 1_000).await
        }));
    }

    let mut new_count = 0;
    for handle in handles {
        let (_, is_new) = handle.await.unwrap().unwrap();
        if is_new {
            new_count += 1;
        }
    }

    assert_eq!(new_count, 1, "Exactly one upsert should create the record");
    assert_eq!(storage.visitor_count().await.unwrap(), 1);

    let (visitor, _) = storage.upsert_visitor("abc", 2_000).await.unwrap();
    assert_eq!(visitor.first_seen, 1_000);
    assert_eq!(visitor.last_visit, 2_000);
}
