//! End-to-end: snapshot → store → latest → evaluate → alert log

use db_monitoring::{
    Snapshot,
    alerts::{AlertLog, AlertSink},
    evaluator::{AlertKind, Severity, Thresholds, evaluate},
    storage::{SnapshotStore, directory::DirectoryStore},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use crate::helpers::{at, create_snapshot, create_table};

async fn evaluate_latest(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<String> {
    let temp_dir = tempdir().unwrap();
    let store = DirectoryStore::open(temp_dir.path()).await.unwrap();
    store.save(snapshot).await.unwrap();

    let latest = store.latest().await.unwrap();
    assert_eq!(&latest, snapshot);

    let alerts = evaluate(&latest, thresholds);
    let sink = AlertSink::new(AlertLog::new(temp_dir.path().join("alerts.log")));
    sink.dispatch(&alerts).await.unwrap();

    if alerts.is_empty() {
        assert!(!sink.log().path().exists());
        return vec![];
    }

    let log = std::fs::read_to_string(sink.log().path()).unwrap();
    let lines: Vec<String> = log.lines().map(str::to_string).collect();
    assert_eq!(lines.len(), alerts.len());
    for (line, alert) in lines.iter().zip(&alerts) {
        assert!(line.ends_with(&format!(": {}", alert.message)), "{line}");
    }

    alerts.into_iter().map(|alert| alert.message).collect()
}

#[tokio::test]
async fn test_slow_queries_above_threshold() {
    let snapshot = create_snapshot(
        at(0, 0),
        &[("Slow_queries", "15"), ("Threads_connected", "5")],
    );
    let thresholds = Thresholds {
        slow_queries: 10,
        threads_connected: 20,
        ..Thresholds::default()
    };

    let messages = evaluate_latest(&snapshot, &thresholds).await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("15"));
}

#[tokio::test]
async fn test_large_table() {
    let mut snapshot = create_snapshot(at(0, 0), &[("Slow_queries", "0")]);
    snapshot
        .tables
        .insert("orders".to_string(), create_table(Some(2_000_000)));
    let thresholds = Thresholds {
        table_rows: 1_000_000,
        ..Thresholds::default()
    };

    let messages = evaluate_latest(&snapshot, &thresholds).await;

    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("orders"));
    assert!(messages[0].contains("2,000,000"));
}

#[tokio::test]
async fn test_partial_failure_is_a_single_warning() {
    let mut snapshot = create_snapshot(
        at(0, 0),
        &[("Slow_queries", "2"), ("Threads_connected", "3")],
    );
    snapshot
        .errors
        .push("Process list error: timeout".to_string());

    let alerts = evaluate(&snapshot, &Thresholds::default());

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::CollectionDegraded);
    assert_eq!(alerts[0].severity(), Severity::Warning);
    assert!(alerts[0].message.contains("timeout"));

    let messages = evaluate_latest(&snapshot, &Thresholds::default()).await;
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn test_partial_failure_does_not_suppress_threshold_alerts() {
    let mut snapshot = create_snapshot(
        at(0, 0),
        &[("Slow_queries", "40"), ("Threads_connected", "3")],
    );
    snapshot
        .errors
        .push("Process list error: timeout".to_string());

    let messages = evaluate_latest(&snapshot, &Thresholds::default()).await;

    assert_eq!(messages.len(), 2);
    assert!(messages[0].contains("timeout"));
    assert!(messages[1].contains("40"));
}

#[tokio::test]
async fn test_failed_collection_round_trips_and_alerts_once() {
    let snapshot = Snapshot::failed(at(0, 0), "Connection error: Access denied");

    let messages = evaluate_latest(&snapshot, &Thresholds::default()).await;

    assert_eq!(
        messages,
        vec!["Metrics collection error: Connection error: Access denied".to_string()]
    );
}

#[tokio::test]
async fn test_legacy_record_is_readable() {
    let temp_dir = tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join("mysql_metrics_20250301_120000.json"),
        r#"{
            "timestamp": "2025-03-01T12:00:00.123456",
            "global_status": {"Slow_queries": "12", "Threads_connected": "4"},
            "processes": {"Sleep": 3},
            "tables": {"orders": {"rows": 10, "data_size": 16384, "index_size": 0}},
            "errors": []
        }"#,
    )
    .unwrap();
    let store = DirectoryStore::open(temp_dir.path()).await.unwrap();

    let latest = store.latest().await.unwrap();
    let alerts = evaluate(&latest, &Thresholds::default());

    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::SlowQueries);
}
