use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::DeliveryError;

pub struct EmailNotifier {
    config: SmtpConfig,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }

    fn format_subject(&self, event: &NotificationEvent) -> String {
        match event.listings.as_slice() {
            [only] => format!("🔔 New listing at {}: {}", only.store_name, only.name),
            listings => format!("🔔 {} new listings found", listings.len()),
        }
    }

    fn format_text_body(&self, event: &NotificationEvent) -> String {
        let mut text = event.plain_text();
        text.push_str(&format!(
            "\nDetected at {}\n",
            event.detected_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        text
    }

    fn build_message(&self, event: &NotificationEvent) -> Result<Message, DeliveryError> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_address)
            .parse()
            .map_err(|e| rejected("from", e))?;
        let to: Mailbox = self.config.to_address.parse().map_err(|e| rejected("to", e))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(self.format_subject(event))
            .header(header::ContentType::TEXT_PLAIN)
            .body(self.format_text_body(event))
            .map_err(|e| rejected("message", e))
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, DeliveryError> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| DeliveryError::Connection(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };

        let mut builder = builder.port(self.config.port).timeout(Some(self.timeout));
        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }
}

fn rejected(part: &str, err: impl std::fmt::Display) -> DeliveryError {
    DeliveryError::Rejected {
        status: part.to_string(),
        message: err.to_string(),
    }
}

/// Maps SMTP failures onto delivery categories. 530/534/535 are the
/// authentication replies.
fn classify_smtp_error(err: &SmtpError, timeout_secs: u64) -> DeliveryError {
    if err.is_timeout() {
        return DeliveryError::Timeout(timeout_secs);
    }
    if let Some(code) = err.status() {
        let code = code.to_string();
        if matches!(code.as_str(), "530" | "534" | "535") {
            return DeliveryError::Authentication(err.to_string());
        }
        return DeliveryError::Rejected {
            status: code,
            message: err.to_string(),
        };
    }
    if err.is_client() {
        return DeliveryError::Unexpected(err.to_string());
    }
    DeliveryError::Connection(err.to_string())
}

#[async_trait]
impl NotifierPlugin for EmailNotifier {
    fn name(&self) -> &str {
        "Email Notifier"
    }

    fn plugin_type(&self) -> &str {
        "email"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, DeliveryError> {
        let email = self.build_message(event)?;
        let mailer = self.build_transport()?;

        let response = mailer
            .send(email)
            .await
            .map_err(|e| classify_smtp_error(&e, self.timeout.as_secs()))?;

        Ok(NotificationResult {
            message_id: response.message().next().map(|s| s.to_string()),
        })
    }
}
