//! Email notification delivery via SMTP.
//!
//! [`EmailNotifier`] wraps the `lettre` async SMTP transport and sends one plain-text
//! message per cycle listing every alert. Port 465 uses implicit TLS, any other port
//! STARTTLS.

use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use super::{Notifier, NotifyError};
use crate::config::EmailConfig;
use crate::evaluator::Alert;

const IMPLICIT_TLS_PORT: u16 = 465;

pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn build_message(&self, alerts: &[Alert]) -> Result<Message, NotifyError> {
        let body = alerts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n");

        Message::builder()
            .from(self.config.from.parse()?)
            .to(self.config.to.parse()?)
            .subject(&self.config.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Build(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let mut builder = if self.config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)?
        }
        .port(self.config.smtp_port);

        if let (Some(user), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    #[instrument(skip_all, fields(to = %self.config.to))]
    async fn notify(&self, alerts: &[Alert]) -> Result<(), NotifyError> {
        let message = self.build_message(alerts)?;
        self.transport()?.send(message).await?;

        info!("Alert email sent to {}", self.config.to);
        Ok(())
    }
}
