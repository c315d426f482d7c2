use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::{trace, warn};

use crate::evaluator::Thresholds;
use crate::util;

/// Snapshot storage configuration
#[derive(Debug, Clone, serde::Deserialize)]
pub struct StorageConfig {
    /// Directory holding one JSON record per snapshot
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            dir: default_storage_dir(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./monitoring_logs")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// May be left out entirely when the environment supplies the connection
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Seconds between two collections
    #[serde(default = "default_interval")]
    pub collect_interval: u64,

    /// Seconds between two evaluations of the latest snapshot
    #[serde(default = "default_interval")]
    pub alert_interval: u64,

    /// Alert log file (defaults to `alerts.log` inside the storage directory)
    pub alert_log: Option<PathBuf>,

    pub notify: Option<NotifyConfig>,
}

impl Config {
    pub fn alert_log_path(&self) -> PathBuf {
        self.alert_log
            .clone()
            .unwrap_or_else(|| self.storage.dir.join("alerts.log"))
    }

    /// Let the environment override connection settings and credentials.
    pub fn apply_env_overrides(&mut self) {
        let database = &mut self.database;

        if let Some(host) = util::get_db_host() {
            database.host = host;
        }
        if let Some(port) = util::get_db_port() {
            database.port = port;
        }
        if let Some(user) = util::get_db_user() {
            database.user = user;
        }
        if let Some(password) = util::get_db_password() {
            database.password = Some(password);
        }
        if let Some(schema) = util::get_db_schema() {
            database.schema = schema;
        }

        if let Some(NotifyConfig::Email(email)) = &mut self.notify
            && let Some(password) = util::get_smtp_password()
        {
            email.password = Some(password);
        }
    }

    /// Only checks what would break the loops themselves. Connection settings are
    /// checked by connecting, so bad ones show up as failed collections.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.collect_interval == 0 || self.alert_interval == 0 {
            bail!("intervals must be at least one second");
        }
        if self.database.connect_timeout == 0 || self.database.query_timeout == 0 {
            bail!("database timeouts must be at least one second");
        }
        Ok(())
    }
}

#[derive(Clone, serde::Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "crate::util::get_default_db_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    pub password: Option<String>,
    #[serde(default)]
    pub schema: String,
    /// Seconds to wait for a connection before giving up
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Seconds a single introspection query may take
    #[serde(default = "default_query_timeout")]
    pub query_timeout: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            host: default_host(),
            port: util::get_default_db_port(),
            user: default_user(),
            password: None,
            schema: String::new(),
            connect_timeout: default_connect_timeout(),
            query_timeout: default_query_timeout(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("schema", &self.schema)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

fn default_host() -> String {
    String::from("localhost")
}

fn default_user() -> String {
    String::from("root")
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyConfig {
    Email(EmailConfig),
    Webhook(Webhook),
    Discord(Discord),
}

#[derive(Clone, serde::Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// 465 uses implicit TLS, any other port STARTTLS
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: String,
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    465
}

fn default_subject() -> String {
    String::from("MySQL Performance Alert")
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

fn default_interval() -> u64 {
    30
}

pub fn parse_config(content: &str) -> anyhow::Result<Config> {
    let raw: serde_json::Value =
        serde_json::from_str(content).context("Invalid configuration file provided!")?;

    if raw
        .get("thresholds")
        .and_then(|thresholds| thresholds.get("query_time"))
        .is_some()
    {
        warn!("thresholds.query_time is not evaluated against any collected signal and is ignored");
    }

    serde_json::from_value(raw).context("Invalid configuration file provided!")
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {path}"))?;
    let mut config = parse_config(&file_content)?;
    config.apply_env_overrides();
    config.validate()?;

    trace!("loaded config: {config:?}");
    Ok(config)
}
