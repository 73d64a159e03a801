use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Timed out after {seconds}s rendering {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Selector '{selector}' matched no items on {url}")]
    NoItems { selector: String, url: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversion from validation errors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

/// Why a single channel failed to deliver. Every notifier maps its transport
/// errors into one of these so the dispatcher can report them uniformly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("payload rejected ({status}): {message}")]
    Rejected { status: String, message: String },

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl DeliveryError {
    /// Short label used in logs and metric labels.
    pub fn category(&self) -> &'static str {
        match self {
            DeliveryError::Authentication(_) => "authentication",
            DeliveryError::Connection(_) => "connection",
            DeliveryError::Timeout(_) => "timeout",
            DeliveryError::Rejected { .. } => "rejected",
            DeliveryError::Unexpected(_) => "unexpected",
        }
    }

    /// Classify a failed HTTP request (no response received).
    pub fn from_request_error(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            DeliveryError::Timeout(timeout_secs)
        } else if err.is_connect() || err.is_request() {
            DeliveryError::Connection(err.to_string())
        } else if err.is_body() || err.is_builder() {
            DeliveryError::Rejected {
                status: "request".to_string(),
                message: err.to_string(),
            }
        } else {
            DeliveryError::Unexpected(err.to_string())
        }
    }

    /// Classify a non-success HTTP status returned by a provider. A 408/504
    /// is reported against the channel's own delivery timeout.
    pub fn from_status(status: reqwest::StatusCode, body: String, timeout_secs: u64) -> Self {
        match status.as_u16() {
            401 | 403 => DeliveryError::Authentication(format!("{}: {}", status, body)),
            408 | 504 => DeliveryError::Timeout(timeout_secs),
            400..=599 => DeliveryError::Rejected {
                status: status.as_u16().to_string(),
                message: body,
            },
            _ => DeliveryError::Unexpected(format!("unexpected status {}: {}", status, body)),
        }
    }
}

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
