use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Authentication failed at {step}: {reason}")]
    AuthenticationError { step: &'static str, reason: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Crawl interrupted")]
    Interrupted,
}

impl CrawlError {
    /// Wraps any failure raised while a handshake step runs.
    pub fn authentication(step: &'static str, cause: impl std::fmt::Display) -> Self {
        CrawlError::AuthenticationError {
            step,
            reason: cause.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
