//! Threshold evaluation
//!
//! Turns one [`Snapshot`] into an ordered list of [`Alert`]s. Evaluation is pure and
//! deterministic: the same snapshot and thresholds always yield the same alerts in the
//! same order.
//!
//! ## Order
//!
//! ```text
//! fatal_error?  → one CollectionFailed alert, stop
//! errors[..]    → one CollectionDegraded alert each
//! Slow_queries  → InvalidValue | SlowQueries (strictly greater than threshold)
//! Threads_conn. → InvalidValue | Connections (strictly greater than threshold)
//! tables (name) → LargeTable per table above table_rows
//! ```
//!
//! Each signal is checked on its own, so a malformed value never hides the others.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Snapshot, SnapshotHealth};

/// Static limits, loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub slow_queries: u64,
    pub threads_connected: u64,
    pub table_rows: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            slow_queries: 10,
            threads_connected: 20,
            table_rows: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CollectionFailed,
    CollectionDegraded,
    InvalidValue,
    SlowQueries,
    Connections,
    LargeTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Alert,
    Critical,
}

/// A single human-readable finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub message: String,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self.kind {
            AlertKind::CollectionFailed => Severity::Critical,
            AlertKind::CollectionDegraded | AlertKind::InvalidValue => Severity::Warning,
            AlertKind::SlowQueries | AlertKind::Connections | AlertKind::LargeTable => {
                Severity::Alert
            }
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub fn evaluate(snapshot: &Snapshot, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = vec![];

    match snapshot.health() {
        SnapshotHealth::Failed(error) => {
            alerts.push(Alert::new(
                AlertKind::CollectionFailed,
                format!("Metrics collection error: {error}"),
            ));
            return alerts;
        }
        SnapshotHealth::Degraded(errors) => {
            alerts.extend(errors.iter().map(|error| {
                Alert::new(
                    AlertKind::CollectionDegraded,
                    format!("Metrics collection warning: {error}"),
                )
            }));
        }
        SnapshotHealth::Healthy => {}
    }

    match read_counter(snapshot, "Slow_queries") {
        Ok(slow_queries) if slow_queries > thresholds.slow_queries => alerts.push(Alert::new(
            AlertKind::SlowQueries,
            format!(
                "High number of slow queries: {slow_queries} (threshold: {})",
                thresholds.slow_queries
            ),
        )),
        Ok(_) => {}
        Err(alert) => alerts.push(alert),
    }

    match read_counter(snapshot, "Threads_connected") {
        Ok(connections) if connections > thresholds.threads_connected => {
            alerts.push(Alert::new(
                AlertKind::Connections,
                format!(
                    "High number of connections: {connections} (threshold: {})",
                    thresholds.threads_connected
                ),
            ))
        }
        Ok(_) => {}
        Err(alert) => alerts.push(alert),
    }

    for (table, metrics) in &snapshot.tables {
        let rows = metrics.rows.unwrap_or_default();
        if rows > thresholds.table_rows {
            alerts.push(Alert::new(
                AlertKind::LargeTable,
                format!("Large table detected: {table} ({} rows)", group_thousands(rows)),
            ));
        }
    }

    alerts
}

/// A missing counter reads as zero; a present but malformed one becomes an alert.
fn read_counter(snapshot: &Snapshot, name: &str) -> Result<u64, Alert> {
    let Some(raw) = snapshot.status_value(name) else {
        return Ok(0);
    };

    raw.trim().parse::<u64>().map_err(|_| {
        Alert::new(
            AlertKind::InvalidValue,
            format!("Invalid value for {name}: '{raw}'"),
        )
    })
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}
