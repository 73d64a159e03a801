use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::models::Listing;
use crate::plugins::traits::{NotificationEvent, NotificationResult, NotifierPlugin};
use crate::utils::error::DeliveryError;

/// Discord caps a message at 10 embeds.
const MAX_EMBEDS: usize = 10;
const MAX_TITLE_CHARS: usize = 256;
const MAX_FIELD_VALUE_CHARS: usize = 1024;
/// Combined titles, field names, field values and footers of one message.
const MAX_EMBED_TOTAL_CHARS: usize = 6000;
const EMPTY_FIELD_VALUE: &str = "n/a";
const EMBED_COLOR: u32 = 0x00ff00;

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max_chars - 1).collect();
    clipped.push('…');
    clipped
}

/// Field values must be 1..=1024 chars.
fn field_value(text: &str) -> String {
    if text.trim().is_empty() {
        EMPTY_FIELD_VALUE.to_string()
    } else {
        clip(text, MAX_FIELD_VALUE_CHARS)
    }
}

/// Characters of an embed that count towards the per-message total.
fn embed_text_len(embed: &serde_json::Value) -> usize {
    let count = |value: &serde_json::Value| value.as_str().map_or(0, |s| s.chars().count());

    let fields: usize = embed["fields"]
        .as_array()
        .map(|fields| fields.iter().map(|f| count(&f["name"]) + count(&f["value"])).sum())
        .unwrap_or(0);

    count(&embed["title"]) + fields + count(&embed["footer"]["text"])
}

/// Posts rich embeds to a Discord channel through the bot API.
pub struct DiscordNotifier {
    client: Client,
    config: ChatConfig,
    timeout_secs: u64,
}

impl DiscordNotifier {
    pub fn new(config: ChatConfig, timeout: Duration) -> Self {
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
            "{}/channels/{}/messages",
            self.config.api_base.trim_end_matches('/'),
            self.config.channel_id
        )
    }

    fn create_embed(&self, listing: &Listing, event: &NotificationEvent) -> serde_json::Value {
        json!({
            "title": clip(&format!("🆕 {}", listing.name), MAX_TITLE_CHARS),
            "url": listing.link,
            "color": EMBED_COLOR,
            "timestamp": event.detected_at.to_rfc3339(),
            "fields": [
                { "name": "🏪 Store", "value": field_value(&listing.store_name), "inline": true },
                { "name": "💰 Price", "value": field_value(&listing.price), "inline": true },
                { "name": "🔗 Link", "value": field_value(&format!("[View product]({})", listing.link)), "inline": false }
            ],
            "footer": { "text": "Shopwatch" }
        })
    }

    fn create_payload(&self, event: &NotificationEvent) -> serde_json::Value {
        let total = event.listings.len();
        let mut embeds = Vec::new();
        let mut used_chars = 0;
        for listing in event.listings.iter().take(MAX_EMBEDS) {
            let embed = self.create_embed(listing, event);
            let len = embed_text_len(&embed);
            if used_chars + len > MAX_EMBED_TOTAL_CHARS {
                break;
            }
            used_chars += len;
            embeds.push(embed);
        }

        let shown = embeds.len();
        let mut content = format!(
            "**{} new listing{}**",
            total,
            if total == 1 { "" } else { "s" }
        );
        if total > shown {
            content.push_str(&format!(" (showing {}, {} more not shown)", shown, total - shown));
        }

        json!({
            "content": content,
            "embeds": embeds,
        })
    }
}

#[async_trait]
impl NotifierPlugin for DiscordNotifier {
    fn name(&self) -> &str {
        "Discord Notifier"
    }

    fn plugin_type(&self) -> &str {
        "discord"
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, DeliveryError> {
        let payload = self.create_payload(event);

        let response = self
            .client
            .post(self.messages_url())
            .header("Authorization", format!("Bot {}", self.config.bot_token))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::from_request_error(&e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DeliveryError::from_status(status, text, self.timeout_secs));
        }

        let message_id = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(|id| format!("discord-{}", id)));

        Ok(NotificationResult { message_id })
    }
}
