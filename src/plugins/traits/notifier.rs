use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Listing;
use crate::utils::error::DeliveryError;

/// The listings found new in one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub cycle_id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub listings: Vec<Listing>,
}

impl NotificationEvent {
    pub fn new(cycle_id: Uuid, listings: Vec<Listing>) -> Self {
        Self {
            cycle_id,
            detected_at: Utc::now(),
            listings,
        }
    }

    /// `New listings:` followed by one summary line per listing.
    pub fn plain_text(&self) -> String {
        let mut text = String::from("New listings:\n");
        for listing in &self.listings {
            text.push_str(&listing.summary_line());
            text.push('\n');
        }
        text
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationResult {
    pub message_id: Option<String>,
}

/// Trait for implementing notification channels (SMS, email, chat).
///
/// Each channel renders its own message from the event and must classify every
/// failure into a [`DeliveryError`] instead of panicking or bubbling up.
#[async_trait]
pub trait NotifierPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn plugin_type(&self) -> &str;

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, DeliveryError>;
}
