use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::config::SmsConfig;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::DeliveryError;

/// Sends a plain-text summary through the Twilio Messages API.
pub struct SmsNotifier {
    client: Client,
    config: SmsConfig,
    timeout_secs: u64,
}

impl SmsNotifier {
    pub fn new(config: SmsConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            timeout_secs: timeout.as_secs(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// Plain-text body cut to `max_length` characters.
    fn format_body(&self, event: &NotificationEvent) -> String {
        event.plain_text().chars().take(self.config.max_length).collect()
    }
}

#[async_trait]
impl NotifierPlugin for SmsNotifier {
    fn name(&self) -> &str {
        "SMS Notifier"
    }

    fn plugin_type(&self) -> &str {
        "sms"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, DeliveryError> {
        let body = self.format_body(event);
        let form = [
            ("To", self.config.to_number.as_str()),
            ("From", self.config.from_number.as_str()),
            ("Body", body.as_str()),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DeliveryError::from_request_error(&e, self.timeout_secs))?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::from_status(status, text, self.timeout_secs));
        }

        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("sid").and_then(|s| s.as_str()).map(|s| s.to_string()));

        Ok(NotificationResult { message_id })
    }
}
