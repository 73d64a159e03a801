use futures::future::join_all;
use serde::Serialize;
use std::time::Duration;

use super::notifiers::{DiscordNotifier, EmailNotifier, SmsNotifier};
use super::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::config::NotificationsConfig;
use crate::utils::error::DeliveryError;

pub type NotifierPluginBox = Box<dyn NotifierPlugin>;

/// What happened on one channel.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelOutcome {
    pub channel: String,
    #[serde(serialize_with = "serialize_result")]
    pub result: Result<NotificationResult, DeliveryError>,
}

fn serialize_result<S: serde::Serializer>(
    result: &Result<NotificationResult, DeliveryError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match result {
        Ok(ok) => serializer.serialize_some(&ok.message_id),
        Err(e) => serializer.serialize_str(&e.to_string()),
    }
}

impl ChannelOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

/// Delivers one event to every registered channel. Channels run concurrently,
/// each under its own timeout, and a failing channel never affects the others.
pub struct NotificationDispatcher {
    notifiers: Vec<NotifierPluginBox>,
    delivery_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(delivery_timeout: Duration) -> Self {
        Self {
            notifiers: Vec::new(),
            delivery_timeout,
        }
    }

    /// Builds the dispatcher with every channel enabled in `config`.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let timeout = Duration::from_secs(config.delivery_timeout);
        let mut dispatcher = Self::new(timeout);

        if config.sms.enabled {
            dispatcher.register_notifier(Box::new(SmsNotifier::new(config.sms.clone(), timeout)));
        }
        if config.email.enabled {
            dispatcher.register_notifier(Box::new(EmailNotifier::new(config.email.clone(), timeout)));
        }
        if config.chat.enabled {
            dispatcher.register_notifier(Box::new(DiscordNotifier::new(config.chat.clone(), timeout)));
        }

        dispatcher
    }

    pub fn register_notifier(&mut self, plugin: NotifierPluginBox) {
        tracing::debug!("Registered notifier: {}", plugin.name());
        self.notifiers.push(plugin);
    }

    /// List all registered notifier types
    pub fn list_notifier_types(&self) -> Vec<String> {
        self.notifiers.iter().map(|n| n.plugin_type().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchReport {
        let attempts = self.notifiers.iter().map(|notifier| self.deliver_one(notifier.as_ref(), event));
        let outcomes = join_all(attempts).await;
        DispatchReport { outcomes }
    }

    async fn deliver_one(&self, notifier: &dyn NotifierPlugin, event: &NotificationEvent) -> ChannelOutcome {
        let channel = notifier.plugin_type().to_string();

        let result = match tokio::time::timeout(self.delivery_timeout, notifier.notify(event)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout.as_secs())),
        };

        match &result {
            Ok(ok) => {
                tracing::info!(channel = %channel, message_id = ?ok.message_id, "Notification delivered");
                metrics::counter!("shopwatch_deliveries_total", "channel" => channel.clone(), "outcome" => "success").increment(1);
            }
            Err(e) => {
                tracing::warn!(channel = %channel, category = e.category(), "Notification failed: {}", e);
                metrics::counter!("shopwatch_deliveries_total", "channel" => channel.clone(), "outcome" => e.category()).increment(1);
            }
        }

        ChannelOutcome { channel, result }
    }
}
