// Integration tests for Shopwatch
// These tests drive whole cycles through in-memory collaborators

pub mod cycle_tests;
pub mod dispatch_tests;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shopwatch::{
    listing_extractor::ListingExtractor,
    models::{ExtractionRule, Listing, Selectors},
    monitor::ListingMonitor,
    plugins::{NotificationDispatcher, NotificationEvent, NotificationResult, NotifierPlugin},
    scraper::StaticPageProvider,
    storage::{RuleSource, SnapshotStore},
    DeliveryError,
};

pub const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

pub fn shop_rule(store_name: &str, url: &str) -> ExtractionRule {
    ExtractionRule::new(
        store_name,
        url,
        Selectors {
            item: "li.product".to_string(),
            name: ".product-name".to_string(),
            price: ".product-price".to_string(),
            link: "a".to_string(),
        },
    )
}

/// Storefront page with one `li.product` per (name, price, href).
pub fn shop_page(items: &[(&str, &str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(name, price, href)| {
            format!(
                r#"<li class="product"><a href="{}"><span class="product-name">{}</span></a><span class="product-price">{}</span></li>"#,
                href, name, price
            )
        })
        .collect();
    format!("<html><body><ul>{}</ul></body></html>", items)
}

pub fn listing(name: &str, store: &str) -> Listing {
    Listing::new(name, "$10.00", &format!("https://shop.example/p/{}", name), store)
}

/// Remembers every event it receives; optionally fails every delivery.
pub struct RecordingNotifier {
    kind: &'static str,
    fail_with: Option<DeliveryError>,
    pub events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            fail_with: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(kind: &'static str, error: DeliveryError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new(kind)
        }
    }
}

#[async_trait]
impl NotifierPlugin for RecordingNotifier {
    fn name(&self) -> &str {
        self.kind
    }

    fn plugin_type(&self) -> &str {
        self.kind
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<NotificationResult, DeliveryError> {
        self.events.lock().unwrap().push(event.clone());
        match &self.fail_with {
            Some(err) => Err(err.clone()),
            None => Ok(NotificationResult {
                message_id: Some(format!("{}-{}", self.kind, event.listings.len())),
            }),
        }
    }
}

pub fn build_monitor(
    provider: StaticPageProvider,
    rules: Arc<dyn RuleSource>,
    snapshot: Arc<dyn SnapshotStore>,
    notifiers: Vec<Box<dyn NotifierPlugin>>,
) -> ListingMonitor {
    let extractor = ListingExtractor::new(Arc::new(provider), RENDER_TIMEOUT);
    let mut dispatcher = NotificationDispatcher::new(Duration::from_secs(30));
    for notifier in notifiers {
        dispatcher.register_notifier(notifier);
    }
    ListingMonitor::new(rules, snapshot, extractor, dispatcher)
}
