//! Collecting and alerting loops working on the same store

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::Utc;
use db_monitoring::{
    Snapshot,
    actors::{messages::MonitorState, monitor::MonitorHandle},
    alerts::{AlertLog, AlertSink},
    evaluator::{AlertKind, Thresholds},
    storage::{SnapshotStore, directory::DirectoryStore},
};
use tempfile::tempdir;

use crate::helpers::{ScriptedSource, create_snapshot};

const LONG_INTERVAL: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_alerter_sees_what_collector_stored() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path().join("snapshots")).await.unwrap());

    let collector = MonitorHandle::spawn_collecting(
        Box::new(ScriptedSource::new(vec![create_snapshot(
            Utc::now(),
            &[("Slow_queries", "15"), ("Threads_connected", "5")],
        )])),
        store.clone(),
        AlertSink::new(AlertLog::new(temp_dir.path().join("collector.log"))),
        Thresholds::default(),
        LONG_INTERVAL,
    );
    let alerter = MonitorHandle::spawn_alerting(
        store.clone(),
        AlertSink::new(AlertLog::new(temp_dir.path().join("alerter.log"))),
        Thresholds::default(),
        LONG_INTERVAL,
    );

    let collected = collector.run_now().await.unwrap();
    assert!(collected.record.is_some());

    let evaluated = alerter.run_now().await.unwrap();
    assert_eq!(evaluated.record, None);
    assert_eq!(evaluated.alerts, collected.alerts);
    assert_eq!(evaluated.alerts.len(), 1);
    assert_eq!(evaluated.alerts[0].kind, AlertKind::SlowQueries);

    let alerter_log = std::fs::read_to_string(temp_dir.path().join("alerter.log")).unwrap();
    assert!(alerter_log.contains("High number of slow queries: 15"));

    for handle in [&collector, &alerter] {
        handle.shutdown().await.unwrap();
        handle.wait_stopped().await.unwrap();
        assert_eq!(handle.state(), MonitorState::Stopped);
    }
}

#[tokio::test]
async fn test_failed_collection_is_stored_and_alerted() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path()).await.unwrap());

    let collector = MonitorHandle::spawn_collecting(
        Box::new(ScriptedSource::new(vec![Snapshot::failed(
            Utc::now(),
            "Connection error: Can't connect to MySQL server",
        )])),
        store.clone(),
        AlertSink::new(AlertLog::new(temp_dir.path().join("alerts.log"))),
        Thresholds::default(),
        LONG_INTERVAL,
    );

    let report = collector.run_now().await.unwrap();

    assert_eq!(report.alerts.len(), 1);
    assert_eq!(report.alerts[0].kind, AlertKind::CollectionFailed);
    let stored = store.load(&report.record.unwrap()).await.unwrap();
    assert!(stored.fatal_error.is_some());
    assert_eq!(stored.status_value("Slow_queries"), Some("0"));

    collector.shutdown().await.unwrap();
    collector.wait_stopped().await.unwrap();
}

#[tokio::test]
async fn test_loop_keeps_collecting_on_schedule() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path()).await.unwrap());
    let source = ScriptedSource::new(vec![create_snapshot(Utc::now(), &[])]);
    let calls = source.calls.clone();

    let collector = MonitorHandle::spawn_collecting(
        Box::new(source),
        store.clone(),
        AlertSink::new(AlertLog::new(temp_dir.path().join("alerts.log"))),
        Thresholds::default(),
        Duration::from_millis(50),
    );

    tokio::time::timeout(Duration::from_secs(5), async {
        while calls.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("collector should have run at least three cycles");

    collector.shutdown().await.unwrap();
    collector.wait_stopped().await.unwrap();

    let cycles = calls.load(Ordering::SeqCst);
    assert_eq!(store.list().await.unwrap().len(), cycles);

    // nothing runs after the loop stopped
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), cycles);
}

#[tokio::test]
async fn test_alerter_with_only_corrupt_records_stays_alive() {
    let temp_dir = tempdir().unwrap();
    let store = Arc::new(DirectoryStore::open(temp_dir.path()).await.unwrap());
    std::fs::write(temp_dir.path().join("mysql_metrics_20250301_120000.json"), b"garbage").unwrap();

    let alerter = MonitorHandle::spawn_alerting(
        store,
        AlertSink::new(AlertLog::new(temp_dir.path().join("alerts.log"))),
        Thresholds::default(),
        LONG_INTERVAL,
    );

    for _ in 0..3 {
        let report = alerter.run_now().await.unwrap();
        assert!(report.alerts.is_empty());
    }
    assert_ne!(alerter.state(), MonitorState::Stopped);

    alerter.shutdown().await.unwrap();
    alerter.wait_stopped().await.unwrap();
}
