//! Helper functions for integration tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use db_monitoring::{Snapshot, TableMetrics, collector::MetricsSource};

pub fn at(secs: i64, nanos: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(1_740_830_400 + secs, nanos).unwrap()
}

pub fn create_snapshot(timestamp: DateTime<Utc>, status: &[(&str, &str)]) -> Snapshot {
    let mut snapshot = Snapshot::new(timestamp);
    for (name, value) in status {
        snapshot
            .global_status
            .insert(name.to_string(), value.to_string());
    }
    snapshot
}

pub fn create_table(rows: Option<u64>) -> TableMetrics {
    TableMetrics {
        rows,
        data_size: Some(1_572_864),
        index_size: Some(262_144),
    }
}

/// Source that replays prepared snapshots, stamped with the current time, and then
/// keeps repeating the last one
pub struct ScriptedSource {
    snapshots: VecDeque<Snapshot>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        assert!(!snapshots.is_empty(), "script needs at least one snapshot");
        Self {
            snapshots: snapshots.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl MetricsSource for ScriptedSource {
    async fn collect(&mut self) -> Snapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut snapshot = if self.snapshots.len() > 1 {
            self.snapshots.pop_front().unwrap()
        } else {
            self.snapshots[0].clone()
        };
        snapshot.timestamp = Utc::now();
        snapshot
    }
}
