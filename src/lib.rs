pub mod actors;
pub mod alerts;
pub mod collector;
pub mod config;
pub mod discord;
pub mod evaluator;
pub mod storage;
pub mod util;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Global status counters collected on every run.
pub const GLOBAL_STATUS_METRICS: [&str; 5] = [
    "Queries",
    "Slow_queries",
    "Threads_connected",
    "Bytes_received",
    "Bytes_sent",
];

/// One observation of database server health.
///
/// A snapshot is always schema-complete: even when collection failed entirely,
/// `global_status`, `processes` and `tables` are present (default-filled or empty)
/// and the failure is carried in `fatal_error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Status counters exactly as reported by the server (text, parsed on read)
    #[serde(deserialize_with = "lenient_status")]
    pub global_status: BTreeMap<String, String>,

    /// Number of server threads per process state
    pub processes: BTreeMap<String, u64>,

    /// Per-table metrics, keyed by lower-cased table name
    pub tables: BTreeMap<String, TableMetrics>,

    /// Partial collection failures, in the order they occurred
    #[serde(default)]
    pub errors: Vec<String>,

    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetrics {
    #[serde(default, deserialize_with = "lenient_count")]
    pub rows: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub data_size: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub index_size: Option<u64>,
}

/// Typed view on how a snapshot's collection went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotHealth<'a> {
    Healthy,
    Degraded(&'a [String]),
    Failed(&'a str),
}

impl Snapshot {
    /// An empty, healthy snapshot taken at `timestamp`.
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            global_status: BTreeMap::new(),
            processes: BTreeMap::new(),
            tables: BTreeMap::new(),
            errors: Vec::new(),
            fatal_error: None,
        }
    }

    /// A snapshot for a collection that could not produce any data.
    pub fn failed(timestamp: DateTime<Utc>, error: impl ToString) -> Self {
        let global_status = GLOBAL_STATUS_METRICS
            .iter()
            .map(|name| (name.to_string(), String::from("0")))
            .collect();

        Self {
            global_status,
            fatal_error: Some(error.to_string()),
            ..Self::new(timestamp)
        }
    }

    pub fn health(&self) -> SnapshotHealth<'_> {
        if let Some(error) = &self.fatal_error {
            SnapshotHealth::Failed(error)
        } else if !self.errors.is_empty() {
            SnapshotHealth::Degraded(&self.errors)
        } else {
            SnapshotHealth::Healthy
        }
    }

    pub fn status_value(&self, name: &str) -> Option<&str> {
        self.global_status.get(name).map(String::as_str)
    }
}

/// Accepts numbers, numeric strings and null; anything else reads as missing.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::Number(number) => number.as_u64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }))
}

/// Keeps status values as text; numbers and booleans are read in their JSON form,
/// nulls are dropped.
fn lenient_status<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some((name, text)),
            other => Some((name, other.to_string())),
        })
        .collect())
}

/// RFC 3339 on write; naive ISO-8601 timestamps are read as UTC.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            })
    }
}
