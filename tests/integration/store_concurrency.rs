//! Concurrent writers and readers on one snapshot directory

use std::sync::Arc;

use db_monitoring::storage::{SnapshotStore, StorageError, directory::DirectoryStore, history};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{at, create_snapshot, create_table};

#[tokio::test]
async fn test_every_snapshot_is_retrievable() {
    let temp_dir = tempdir().unwrap();
    let store = DirectoryStore::open(temp_dir.path()).await.unwrap();

    // two of them share the second 12:00:03
    let timestamps = [at(0, 0), at(1, 0), at(3, 100_000_000), at(3, 750_000_000), at(7, 0)];
    let mut snapshots = vec![];
    for (i, timestamp) in timestamps.into_iter().enumerate() {
        let value = i.to_string();
        let mut snapshot = create_snapshot(timestamp, &[("Queries", value.as_str())]);
        snapshot
            .tables
            .insert(format!("table_{i}"), create_table(Some(i as u64)));
        snapshots.push(snapshot);
    }

    // save in reverse to make sure order on disk does not matter
    for snapshot in snapshots.iter().rev() {
        store.save(snapshot).await.unwrap();
    }

    let ids = store.list().await.unwrap();
    assert_eq!(ids.len(), snapshots.len());

    let mut loaded = vec![];
    for id in &ids {
        loaded.push(store.load(id).await.unwrap());
    }
    loaded.sort_by_key(|snapshot| snapshot.timestamp);
    assert_eq!(loaded, snapshots);

    assert_eq!(store.latest().await.unwrap(), snapshots[4]);
}

#[tokio::test]
async fn test_latest_prefers_later_snapshot_in_same_second() {
    let temp_dir = tempdir().unwrap();
    let store = DirectoryStore::open(temp_dir.path()).await.unwrap();

    let later = create_snapshot(at(3, 750_000_000), &[("Slow_queries", "2")]);
    let earlier = create_snapshot(at(3, 100_000_000), &[("Slow_queries", "1")]);
    store.save(&later).await.unwrap();
    store.save(&earlier).await.unwrap();

    assert_eq!(store.latest().await.unwrap(), later);
}

#[tokio::test]
async fn test_concurrent_saves_in_one_second_never_overwrite() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path()).await.unwrap());

    let mut tasks = vec![];
    for i in 0..16u32 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let value = i.to_string();
            let snapshot = create_snapshot(at(0, i * 1_000_000), &[("Queries", value.as_str())]);
            store.save(&snapshot).await.unwrap()
        }));
    }

    let mut ids = vec![];
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 16);
    assert_eq!(store.list().await.unwrap(), ids);

    let latest = store.latest().await.unwrap();
    assert_eq!(latest.status_value("Queries"), Some("15"));
}

#[tokio::test]
async fn test_readers_never_see_partial_records() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path()).await.unwrap());

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let mut snapshot = create_snapshot(at(i, 0), &[]);
                for table in 0..50 {
                    snapshot
                        .tables
                        .insert(format!("table_{table}"), create_table(Some(table)));
                }
                store.save(&snapshot).await.unwrap();
            }
        })
    };

    let reader = {
        let store = store.clone();
        tokio::spawn(async move {
            let mut seen = 0;
            while seen < 50 {
                match store.latest().await {
                    Ok(snapshot) => {
                        assert_eq!(snapshot.tables.len(), 50);
                        seen += 1;
                    }
                    Err(StorageError::NotFound) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
                for id in store.list().await.unwrap() {
                    store.load(&id).await.unwrap();
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
}

#[tokio::test]
async fn test_history_streams_oldest_first() {
    let temp_dir = tempdir().unwrap();
    let store = DirectoryStore::open(temp_dir.path()).await.unwrap();
    for i in [5, 1, 3] {
        store.save(&create_snapshot(at(i, 0), &[])).await.unwrap();
    }

    let timestamps: Vec<_> = history(&store)
        .await
        .unwrap()
        .map(|(_, snapshot)| snapshot.unwrap().timestamp)
        .collect()
        .await;

    assert_eq!(timestamps, vec![at(1, 0), at(3, 0), at(5, 0)]);
}
