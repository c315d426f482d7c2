use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::alerts::{Notifier, NotifyError};
use crate::config::Discord;
use crate::evaluator::{Alert, Severity};

/// Discord allows at most 25 fields per embed
const MAX_FIELDS: usize = 25;

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Default)]
pub struct MessageBuilder {
    content: Option<String>,
    embeds: Vec<Embed>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    pub fn add_embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn build(self) -> Message {
        Message {
            content: self.content,
            embeds: self.embeds,
        }
    }
}

/// Sends alerts to a Discord channel webhook
#[derive(Debug, Clone)]
pub struct DiscordNotifier {
    client: Client,
    discord: Discord,
}

impl DiscordNotifier {
    pub fn new(discord: Discord) -> Self {
        Self {
            client: Client::new(),
            discord,
        }
    }

    pub fn build_alert_embed(alerts: &[Alert]) -> Embed {
        let worst = alerts.iter().map(Alert::severity).max();

        let (title, color) = match worst {
            Some(Severity::Critical) => ("🚨 MySQL Collection Failed", 15158332), // Red
            Some(Severity::Alert) => ("⚠️ MySQL Performance Alert", 15105570),    // Orange
            _ => ("ℹ️ MySQL Collection Warning", 16776960),                       // Yellow
        };

        let mut fields: Vec<_> = alerts
            .iter()
            .take(MAX_FIELDS)
            .map(|alert| EmbedField {
                name: Self::severity_label(alert.severity()).to_string(),
                value: alert.message.clone(),
                inline: false,
            })
            .collect();

        if alerts.len() > MAX_FIELDS {
            // keep the limit by replacing the last field with a summary
            fields.truncate(MAX_FIELDS - 1);
            fields.push(EmbedField {
                name: "…".to_string(),
                value: format!("and {} more", alerts.len() - (MAX_FIELDS - 1)),
                inline: false,
            });
        }

        Embed {
            title: Some(title.to_string()),
            description: None,
            color: Some(color),
            fields,
            footer: Some(EmbedFooter {
                text: format!("{} alert(s)", alerts.len()),
            }),
            timestamp: Some(Utc::now().to_rfc3339()),
        }
    }

    fn severity_label(severity: Severity) -> &'static str {
        match severity {
            Severity::Critical => "🔴 Critical",
            Severity::Alert => "🟠 Alert",
            Severity::Warning => "🟡 Warning",
        }
    }

    pub fn build_message(&self, alerts: &[Alert]) -> Message {
        let mut message_builder = MessageBuilder::new().add_embed(Self::build_alert_embed(alerts));
        if let Some(user_id) = &self.discord.user_id {
            message_builder = message_builder.content(format!("<@{user_id}>"));
        }
        message_builder.build()
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    fn name(&self) -> &'static str {
        "discord"
    }

    #[instrument(skip_all)]
    async fn notify(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.discord.url)
            .json(&self.build_message(alerts))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            if let Ok(error_text) = response.text().await {
                error!("Discord API error response: {}", error_text);
            }
            return Err(NotifyError::Status(status));
        }

        info!("Successfully sent Discord message");
        Ok(())
    }
}
