//! Snapshot collection
//!
//! ## Partial Success
//!
//! A collection runs three independent introspection steps over one short-lived
//! connection:
//!
//! ```text
//! connect ──✗──→ Snapshot::failed("Connection error: …")
//!    │
//!    ├─ global status   ──✗──→ errors += "Global status error: …"
//!    ├─ process list    ──✗──→ errors += "Process list error: …"
//!    └─ table listing   ──✗──→ errors += "Table list error: …"
//!          └─ per table ──✗──→ errors += "Table metrics error (<table>): …"
//! ```
//!
//! A failing step never stops the others, so a degraded server still produces
//! whatever data could be read. Every step is bounded by the query timeout; a
//! stalled statement is recorded like any other step failure.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection, Executor, Row};
use tracing::{debug, instrument, trace, warn};

use crate::config::DatabaseConfig;
use crate::{GLOBAL_STATUS_METRICS, Snapshot, TableMetrics};

/// Process state name used for threads that report none
const NO_STATE: &str = "(none)";

const PROCESS_LIST_SQL: &str = "SELECT COUNT(*) AS count, CAST(state AS CHAR) AS state \
     FROM information_schema.processlist GROUP BY state";

const TABLE_LIST_SQL: &str = "SELECT CAST(table_name AS CHAR) AS name \
     FROM information_schema.tables WHERE table_schema = ?";

const TABLE_METRICS_SQL: &str = "SELECT CAST(table_rows AS UNSIGNED) AS table_rows, \
     CAST(data_length AS UNSIGNED) AS data_length, \
     CAST(index_length AS UNSIGNED) AS index_length \
     FROM information_schema.tables WHERE table_schema = ? AND table_name = ?";

/// Anything that can produce snapshots.
///
/// `collect` cannot fail: every failure is folded into the returned snapshot.
#[async_trait]
pub trait MetricsSource: Send {
    async fn collect(&mut self) -> Snapshot;
}

/// The introspection steps of one collection, all issued over the same connection
#[async_trait]
pub trait HealthQueries: Send {
    async fn global_status(&mut self) -> Result<BTreeMap<String, String>>;

    async fn processes(&mut self) -> Result<BTreeMap<String, u64>>;

    async fn table_names(&mut self) -> Result<Vec<String>>;

    async fn table_metrics(&mut self, table: &str) -> Result<TableMetrics>;
}

/// Hands out timestamps that never go backwards, even if the wall clock does.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Option<DateTime<Utc>>,
}

impl MonotonicClock {
    pub fn now(&mut self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    fn observe(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let timestamp = match self.last {
            Some(last) if now < last => last,
            _ => now,
        };
        self.last = Some(timestamp);
        timestamp
    }
}

async fn bounded<T>(step_timeout: Duration, step: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(step_timeout, step)
        .await
        .unwrap_or_else(|_| Err(anyhow!("timed out after {step_timeout:?}")))
}

/// Run every step and fold the failures into the snapshot's `errors`.
///
/// Once a table probe times out the connection may still be busy with the
/// abandoned statement, so the remaining tables are skipped.
pub async fn assemble<Q>(
    queries: &mut Q,
    timestamp: DateTime<Utc>,
    step_timeout: Duration,
) -> Snapshot
where
    Q: HealthQueries + ?Sized,
{
    let mut snapshot = Snapshot::new(timestamp);

    match bounded(step_timeout, queries.global_status()).await {
        Ok(status) => snapshot.global_status = status,
        Err(e) => snapshot.errors.push(format!("Global status error: {e:#}")),
    }

    match bounded(step_timeout, queries.processes()).await {
        Ok(processes) => snapshot.processes = processes,
        Err(e) => snapshot.errors.push(format!("Process list error: {e:#}")),
    }

    let names = match bounded(step_timeout, queries.table_names()).await {
        Ok(names) => names,
        Err(e) => {
            snapshot.errors.push(format!("Table list error: {e:#}"));
            return snapshot;
        }
    };

    trace!("probing {} tables", names.len());

    for (i, name) in names.iter().enumerate() {
        let probe = tokio::time::timeout(step_timeout, queries.table_metrics(name)).await;
        match probe {
            Ok(Ok(metrics)) => {
                snapshot.tables.insert(name.to_lowercase(), metrics);
            }
            Ok(Err(e)) => snapshot
                .errors
                .push(format!("Table metrics error ({name}): {e:#}")),
            Err(_) => {
                snapshot.errors.push(format!(
                    "Table metrics error ({name}): timed out after {step_timeout:?}"
                ));
                let skipped = names.len() - i - 1;
                if skipped > 0 {
                    snapshot.errors.push(format!(
                        "Table metrics error: {skipped} tables skipped after timeout"
                    ));
                }
                break;
            }
        }
    }

    snapshot
}

/// One live connection plus the schema it inspects
struct MySqlQueries {
    conn: MySqlConnection,
    schema: String,
}

#[async_trait]
impl HealthQueries for MySqlQueries {
    async fn global_status(&mut self) -> Result<BTreeMap<String, String>> {
        let names = GLOBAL_STATUS_METRICS
            .iter()
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("SHOW GLOBAL STATUS WHERE Variable_name IN ({names})");

        // SHOW is not preparable on every server version, so use the text protocol
        let rows = Executor::fetch_all(&mut self.conn, sqlx::raw_sql(&sql)).await?;

        let mut status = BTreeMap::new();
        for row in rows {
            status.insert(row.try_get::<String, _>(0)?, row.try_get::<String, _>(1)?);
        }

        Ok(status)
    }

    async fn processes(&mut self) -> Result<BTreeMap<String, u64>> {
        let rows = sqlx::query(PROCESS_LIST_SQL)
            .fetch_all(&mut self.conn)
            .await?;

        let mut processes = BTreeMap::new();
        for row in rows {
            let count: i64 = row.try_get("count")?;
            let state = row
                .try_get::<Option<String>, _>("state")?
                .filter(|state| !state.is_empty())
                .unwrap_or_else(|| NO_STATE.to_string());

            *processes.entry(state).or_insert(0) += u64::try_from(count).unwrap_or_default();
        }

        Ok(processes)
    }

    async fn table_names(&mut self) -> Result<Vec<String>> {
        if self.schema.is_empty() {
            bail!("no schema configured");
        }

        let rows = sqlx::query(TABLE_LIST_SQL)
            .bind(&self.schema)
            .fetch_all(&mut self.conn)
            .await?;

        let names = rows
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(names)
    }

    async fn table_metrics(&mut self, table: &str) -> Result<TableMetrics> {
        let row = sqlx::query(TABLE_METRICS_SQL)
            .bind(&self.schema)
            .bind(table)
            .fetch_optional(&mut self.conn)
            .await?
            .context("table no longer exists")?;

        Ok(TableMetrics {
            rows: row.try_get("table_rows")?,
            data_size: row.try_get("data_length")?,
            index_size: row.try_get("index_length")?,
        })
    }
}

/// Collects snapshots from a MySQL server
pub struct MySqlCollector {
    config: DatabaseConfig,
    clock: MonotonicClock,
}

impl MySqlCollector {
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            config,
            clock: MonotonicClock::default(),
        }
    }

    async fn connect(&self) -> Result<MySqlConnection> {
        let mut options = MySqlConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .username(&self.config.user);

        if !self.config.schema.is_empty() {
            options = options.database(&self.config.schema);
        }
        if let Some(password) = &self.config.password {
            options = options.password(password);
        }

        let timeout = Duration::from_secs(self.config.connect_timeout);
        tokio::time::timeout(timeout, options.connect())
            .await
            .with_context(|| format!("timed out after {}s", timeout.as_secs()))?
            .context("failed to connect")
    }
}

#[async_trait]
impl MetricsSource for MySqlCollector {
    #[instrument(skip(self), fields(host = %self.config.host, schema = %self.config.schema))]
    async fn collect(&mut self) -> Snapshot {
        let timestamp = self.clock.now();

        let conn = match self.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("collection failed: {e:#}");
                return Snapshot::failed(timestamp, format!("Connection error: {e:#}"));
            }
        };

        let mut queries = MySqlQueries {
            conn,
            schema: self.config.schema.clone(),
        };
        let step_timeout = Duration::from_secs(self.config.query_timeout);
        let snapshot = assemble(&mut queries, timestamp, step_timeout).await;

        if let Err(e) = queries.conn.close().await {
            debug!("error while closing connection: {e}");
        }

        for error in &snapshot.errors {
            warn!("partial collection failure: {error}");
        }

        debug!(
            "collected {} status values, {} process states, {} tables",
            snapshot.global_status.len(),
            snapshot.processes.len(),
            snapshot.tables.len()
        );

        snapshot
    }
}
