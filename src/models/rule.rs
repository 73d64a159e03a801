use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;
use validator::Validate;

use crate::utils::error::{AppError, Result};

/// CSS selectors describing where listings live on a storefront page.
/// `name`, `price` and `link` are evaluated relative to each `item` match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct Selectors {
    #[validate(length(min = 1, message = "item selector must not be empty"))]
    pub item: String,
    #[validate(length(min = 1, message = "name selector must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "price selector must not be empty"))]
    pub price: String,
    #[validate(length(min = 1, message = "link selector must not be empty"))]
    pub link: String,
}

/// Declarative description of one storefront.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ExtractionRule {
    #[validate(length(min = 1, message = "store_name must not be empty"))]
    pub store_name: String,

    #[validate(url(message = "entry_url must be an absolute URL"))]
    pub entry_url: String,

    #[validate(nested)]
    pub selectors: Selectors,

    /// Prefix for links that come back without a scheme, e.g. `https://shop.example`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url(message = "link_base must be an absolute URL"))]
    pub link_base: Option<String>,

    /// Attribute holding the product URL on the link element.
    #[serde(default = "default_link_attribute")]
    #[validate(length(min = 1, message = "link_attribute must not be empty"))]
    pub link_attribute: String,
}

fn default_link_attribute() -> String {
    "href".to_string()
}

impl ExtractionRule {
    pub fn new(store_name: &str, entry_url: &str, selectors: Selectors) -> Self {
        Self {
            store_name: store_name.to_string(),
            entry_url: entry_url.to_string(),
            selectors,
            link_base: None,
            link_attribute: default_link_attribute(),
        }
    }

    pub fn with_link_base(mut self, link_base: &str) -> Self {
        self.link_base = Some(link_base.to_string());
        self
    }

    /// Checks that the rule is usable: non-empty selectors and absolute URLs.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        Ok(())
    }

    /// Turns a raw link attribute into an absolute URL.
    ///
    /// Links that already parse as absolute URLs are returned unchanged. With a
    /// `link_base` the raw link is prefixed with it; otherwise it is resolved
    /// against the entry URL. If neither works the raw value is kept.
    pub fn normalize_link(&self, raw: &str) -> String {
        let raw = raw.trim();
        if Url::parse(raw).is_ok() {
            return raw.to_string();
        }

        if let Some(base) = &self.link_base {
            if let Some(rest) = raw.strip_prefix("//") {
                let scheme = Url::parse(base)
                    .map(|u| u.scheme().to_string())
                    .unwrap_or_else(|_| "https".to_string());
                return format!("{}://{}", scheme, rest);
            }
            return format!(
                "{}/{}",
                base.trim_end_matches('/'),
                raw.trim_start_matches('/')
            );
        }

        Url::parse(&self.entry_url)
            .and_then(|entry| entry.join(raw))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| raw.to_string())
    }
}

/// A rule that failed validation, kept so callers can report it.
#[derive(Debug, Clone)]
pub struct RejectedRule {
    pub store_name: String,
    pub reason: String,
}

/// Splits a rule set into usable rules and rejected ones. The first rule for a
/// given store name wins; later duplicates are rejected.
pub fn partition_rules(rules: Vec<ExtractionRule>) -> (Vec<ExtractionRule>, Vec<RejectedRule>) {
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut rejected = Vec::new();

    for rule in rules {
        if let Err(e) = rule.check() {
            rejected.push(RejectedRule {
                store_name: rule.store_name.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        if !seen.insert(rule.store_name.clone()) {
            rejected.push(RejectedRule {
                store_name: rule.store_name.clone(),
                reason: AppError::Validation(format!(
                    "duplicate store_name '{}'",
                    rule.store_name
                ))
                .to_string(),
            });
            continue;
        }
        valid.push(rule);
    }

    (valid, rejected)
}
