pub mod listing;
pub mod rule;

// Re-exports for convenience
pub use listing::Listing;
pub use rule::{partition_rules, ExtractionRule, RejectedRule, Selectors};
