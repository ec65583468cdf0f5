use chrono::{Duration, Utc};
use tempfile::tempdir;
use uuid::Uuid;

use disappr_core::storage::{Note, NotePatch, NoteStore, SqliteNoteStore, StoreError, UpdateOutcome};

fn note(expires_in: Duration) -> Note {
    let now = Utc::now();
    Note {
        id: Uuid::new_v4(),
        sealed_content: "c2VhbGVk".to_string(),
        burn_after_read: true,
        expires_at: now + expires_in,
        consumed: false,
        owner_subject: "user-1".to_string(),
        created_at: now,
    }
}

#[tokio::test]
async fn test_put_get_round_trip_survives_reopen() {
    let dir = tempdir().expect("tempdir should be created");
    let path = dir.path().join("nested").join("notes.db");
    let original = note(Duration::minutes(5));

    {
        let store = SqliteNoteStore::open(&path).expect("open should succeed");
        store.put(&original).await.expect("put should succeed");
    }

    let store = SqliteNoteStore::open(&path).expect("reopen should succeed");
    let loaded = store
        .get(&original.id)
        .await
        .expect("get should succeed")
        .expect("note should exist");

    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.sealed_content, original.sealed_content);
    assert_eq!(loaded.owner_subject, original.owner_subject);
    assert_eq!(
        loaded.expires_at.timestamp_micros(),
        original.expires_at.timestamp_micros()
    );
    assert!(!loaded.consumed);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let loaded = store.get(&Uuid::new_v4()).await.expect("get should succeed");
    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_put_refuses_to_overwrite() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let original = note(Duration::minutes(5));
    store.put(&original).await.expect("put should succeed");

    let mut duplicate = original.clone();
    duplicate.sealed_content = "b3RoZXI=".to_string();
    let err = store.put(&duplicate).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(id) if id == original.id));

    let loaded = store.get(&original.id).await.unwrap().unwrap();
    assert_eq!(loaded.sealed_content, original.sealed_content);
}

#[tokio::test]
async fn test_conditional_consume() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let record = note(Duration::minutes(5));
    store.put(&record).await.expect("put should succeed");

    let first = store.update(&record.id, &NotePatch::consume()).await.unwrap();
    let second = store.update(&record.id, &NotePatch::consume()).await.unwrap();
    let missing = store
        .update(&Uuid::new_v4(), &NotePatch::consume())
        .await
        .unwrap();

    assert_eq!(first, UpdateOutcome::Applied);
    assert_eq!(second, UpdateOutcome::Unchanged);
    assert_eq!(missing, UpdateOutcome::Missing);
    assert!(store.get(&record.id).await.unwrap().unwrap().consumed);
}

#[tokio::test]
async fn test_consumed_flag_cannot_be_cleared() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let record = note(Duration::minutes(5));
    store.put(&record).await.expect("put should succeed");
    store.update(&record.id, &NotePatch::consume()).await.unwrap();

    let clear = NotePatch {
        consumed: Some(false),
    };
    let err = store.update(&record.id, &clear).await.unwrap_err();
    assert!(matches!(err, StoreError::Rejected(_)));
    assert!(store.get(&record.id).await.unwrap().unwrap().consumed);
}

#[tokio::test]
async fn test_concurrent_consume_applies_exactly_once() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let record = note(Duration::minutes(5));
    store.put(&record).await.expect("put should succeed");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let id = record.id;
        handles.push(tokio::spawn(async move {
            store.update(&id, &NotePatch::consume()).await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap() == UpdateOutcome::Applied {
            applied += 1;
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn test_purge_removes_expired_and_consumed() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let live = note(Duration::minutes(5));
    let expired = note(Duration::minutes(-5));
    let consumed = note(Duration::minutes(5));
    for record in [&live, &expired, &consumed] {
        store.put(record).await.expect("put should succeed");
    }
    store.update(&consumed.id, &NotePatch::consume()).await.unwrap();

    let purged = store.purge_expired(Utc::now()).await.expect("purge should succeed");

    assert_eq!(purged, 2);
    assert!(store.get(&live.id).await.unwrap().is_some());
    assert!(store.get(&expired.id).await.unwrap().is_none());
    assert!(store.get(&consumed.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_far_future_expiry_round_trips_and_survives_purge() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let distant = note(Duration::minutes(6_000_000_000));
    let live = note(Duration::minutes(5));
    store.put(&distant).await.expect("put should succeed");
    store.put(&live).await.expect("put should succeed");

    let loaded = store
        .get(&distant.id)
        .await
        .expect("get should succeed")
        .expect("note should exist");
    assert_eq!(
        loaded.expires_at.timestamp_micros(),
        distant.expires_at.timestamp_micros()
    );

    let purged = store.purge_expired(Utc::now()).await.expect("purge should succeed");
    assert_eq!(purged, 0);
    assert!(store.get(&distant.id).await.expect("get should succeed").is_some());
}

#[tokio::test]
async fn test_ancient_expiry_round_trips_and_is_purged() {
    let store = SqliteNoteStore::open_in_memory().expect("open should succeed");
    let ancient = note(Duration::minutes(-2_000_000_000));
    store.put(&ancient).await.expect("put should succeed");

    let loaded = store
        .get(&ancient.id)
        .await
        .expect("get should succeed")
        .expect("note should exist");
    assert_eq!(
        loaded.expires_at.timestamp_micros(),
        ancient.expires_at.timestamp_micros()
    );
    assert!(!loaded.is_readable_at(Utc::now()));

    let purged = store.purge_expired(Utc::now()).await.expect("purge should succeed");
    assert_eq!(purged, 1);
    assert!(store.get(&ancient.id).await.expect("get should succeed").is_none());
}
