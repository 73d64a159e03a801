pub mod config;
pub mod listing_extractor;
pub mod models;
pub mod monitor;
pub mod novelty;
pub mod plugins;
pub mod scheduler;
pub mod scraper;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use listing_extractor::ListingExtractor;
pub use models::{ExtractionRule, Listing, Selectors};
pub use monitor::{CycleReport, ListingMonitor};
pub use novelty::detect_new;
pub use utils::error::{AppError, DeliveryError};

pub type Result<T> = std::result::Result<T, AppError>;
