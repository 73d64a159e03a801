use serde::{Deserialize, Serialize};

/// One product observed on one storefront during one cycle.
///
/// `name` is the identity key: two listings with the same name are the same
/// listing no matter what their price or link say.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub price: String,
    pub link: String,
    pub store_name: String,
}

impl Listing {
    pub fn new(name: &str, price: &str, link: &str, store_name: &str) -> Self {
        Self {
            name: name.to_string(),
            price: price.to_string(),
            link: link.to_string(),
            store_name: store_name.to_string(),
        }
    }

    /// `- [store] name - price - link`
    pub fn summary_line(&self) -> String {
        format!(
            "- [{}] {} - {} - {}",
            self.store_name, self.name, self.price, self.link
        )
    }
}
