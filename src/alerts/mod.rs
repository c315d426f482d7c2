//! Alert sink
//!
//! Every alert is first appended to the durable [`AlertLog`]. Afterwards the whole list
//! of a cycle's alerts may be handed to a [`Notifier`] (email, webhook or Discord).
//! Notification is best effort: it is bounded by a timeout, never retried, and its
//! failure never affects what was already logged.

pub mod email;
pub mod log;
pub mod webhook;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::config::{Config, NotifyConfig};
use crate::discord::DiscordNotifier;
use crate::evaluator::Alert;

pub use email::EmailNotifier;
pub use log::AlertLog;
pub use webhook::WebhookNotifier;

/// Upper bound for one notification attempt
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("SMTP transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("email build error: {0}")]
    Build(String),

    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
}

/// External delivery of a cycle's alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Transport name, for logging
    fn name(&self) -> &'static str;

    async fn notify(&self, alerts: &[Alert]) -> Result<(), NotifyError>;
}

pub fn notifier_from_config(config: &NotifyConfig) -> Box<dyn Notifier> {
    match config {
        NotifyConfig::Email(email) => Box::new(EmailNotifier::new(email.clone())),
        NotifyConfig::Webhook(webhook) => Box::new(WebhookNotifier::new(webhook.clone())),
        NotifyConfig::Discord(discord) => Box::new(DiscordNotifier::new(discord.clone())),
    }
}

pub struct AlertSink {
    log: AlertLog,
    notifier: Option<Box<dyn Notifier>>,
    notify_timeout: Duration,
}

impl AlertSink {
    pub fn new(log: AlertLog) -> Self {
        Self {
            log,
            notifier: None,
            notify_timeout: NOTIFY_TIMEOUT,
        }
    }

    /// Alert log and optional notifier as configured
    pub fn from_config(config: &Config) -> Self {
        let sink = Self::new(AlertLog::new(config.alert_log_path()));
        match &config.notify {
            Some(notify) => sink.with_notifier(notifier_from_config(notify)),
            None => sink,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub fn log(&self) -> &AlertLog {
        &self.log
    }

    pub async fn record(&self, alert: &Alert, timestamp: chrono::DateTime<Utc>) -> io::Result<()> {
        warn!(severity = ?alert.severity(), "ALERT: {alert}");
        self.log.append(alert, timestamp).await
    }

    /// Append every alert, stopping at the first write failure.
    pub async fn record_all(&self, alerts: &[Alert]) -> io::Result<()> {
        for alert in alerts {
            self.record(alert, Utc::now()).await?;
        }
        Ok(())
    }

    /// Hand the alerts to the notifier, if any. Failures are logged only.
    #[instrument(skip_all, fields(count = alerts.len()))]
    pub async fn notify(&self, alerts: &[Alert]) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        if alerts.is_empty() {
            return;
        }

        let result = tokio::time::timeout(self.notify_timeout, notifier.notify(alerts))
            .await
            .unwrap_or(Err(NotifyError::Timeout(self.notify_timeout)));

        match result {
            Ok(()) => info!("sent {} alerts via {}", alerts.len(), notifier.name()),
            Err(e) => error!("failed to send alerts via {}: {e}", notifier.name()),
        }
    }

    /// Record, then notify. Notification happens even if recording failed.
    pub async fn dispatch(&self, alerts: &[Alert]) -> io::Result<()> {
        let recorded = self.record_all(alerts).await;
        self.notify(alerts).await;
        recorded
    }
}
