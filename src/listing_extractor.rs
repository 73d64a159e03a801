use std::sync::Arc;
use std::time::Duration;

use crate::models::{ExtractionRule, Listing};
use crate::scraper::{HtmlPage, Page, PageProvider};
use crate::utils::error::{AppError, Result};

/// Turns extraction rules into listings by rendering each store's entry page.
pub struct ListingExtractor {
    provider: Arc<dyn PageProvider>,
    render_timeout: Duration,
}

impl ListingExtractor {
    pub fn new(provider: Arc<dyn PageProvider>, render_timeout: Duration) -> Self {
        Self {
            provider,
            render_timeout,
        }
    }

    /// Renders `rule.entry_url` and extracts its listings.
    ///
    /// Render failures, timeouts, bad selectors and pages where the item
    /// selector matches nothing are returned as errors; the caller decides
    /// whether they are fatal.
    pub async fn extract(&self, rule: &ExtractionRule) -> Result<Vec<Listing>> {
        tracing::debug!(store = %rule.store_name, url = %rule.entry_url, "rendering store page");

        let rendered = tokio::time::timeout(self.render_timeout, self.provider.render(&rule.entry_url))
            .await
            .map_err(|_| AppError::Timeout {
                url: rule.entry_url.clone(),
                seconds: self.render_timeout.as_secs(),
            })??;

        let page = HtmlPage::parse(&rendered.html);
        extract_from_page(rule, &page)
    }
}

/// Extracts listings from an already rendered page.
///
/// Items missing any of name, price or link are dropped without error.
pub fn extract_from_page(rule: &ExtractionRule, page: &dyn Page) -> Result<Vec<Listing>> {
    let items = page.query_all(&rule.selectors.item)?;
    if items.is_empty() {
        return Err(AppError::NoItems {
            selector: rule.selectors.item.clone(),
            url: rule.entry_url.clone(),
        });
    }

    let mut listings = Vec::with_capacity(items.len());
    for (position, item) in items.iter().enumerate() {
        let name = item.query(&rule.selectors.name)?;
        let price = item.query(&rule.selectors.price)?;
        let link = item.query(&rule.selectors.link)?;

        let (Some(name), Some(price), Some(link)) = (name, price, link) else {
            tracing::trace!(store = %rule.store_name, position, "skipping partial item");
            continue;
        };
        let Some(href) = link.attribute(&rule.link_attribute) else {
            tracing::trace!(store = %rule.store_name, position, "skipping item without link attribute");
            continue;
        };

        listings.push(Listing {
            name: name.inner_text(),
            price: price.inner_text(),
            link: rule.normalize_link(&href),
            store_name: rule.store_name.clone(),
        });
    }

    tracing::debug!(
        store = %rule.store_name,
        candidates = items.len(),
        extracted = listings.len(),
        "extracted listings"
    );
    Ok(listings)
}
