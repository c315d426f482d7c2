use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{info, instrument};

use super::{Notifier, NotifyError};
use crate::config::Webhook;
use crate::evaluator::Alert;

/// Posts alerts as JSON to a generic webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook: Webhook,
}

impl WebhookNotifier {
    pub fn new(webhook: Webhook) -> Self {
        Self {
            client: Client::new(),
            webhook,
        }
    }

    pub fn payload(alerts: &[Alert]) -> serde_json::Value {
        let message = alerts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        json!({
            "message": message,
            "alerts": alerts
                .iter()
                .map(|alert| json!({
                    "kind": alert.kind,
                    "severity": alert.severity(),
                    "message": alert.message,
                }))
                .collect::<Vec<_>>(),
            "timestamp": Utc::now().to_rfc3339()
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    #[instrument(skip_all)]
    async fn notify(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.webhook.url)
            .json(&Self::payload(alerts))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status()));
        }

        info!("Successfully sent webhook alert");
        Ok(())
    }
}
