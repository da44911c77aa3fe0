//! Error types for the Slack front end

use thiserror::Error;

/// Result type alias for Slack operations
pub type Result<T> = std::result::Result<T, SlackError>;

#[derive(Error, Debug)]
pub enum SlackError {
    /// Missing, stale or mismatched request signature
    #[error("Request verification failed: {0}")]
    Verification(String),

    /// Request body is not a usable event payload
    #[error("Invalid event payload: {0}")]
    Payload(String),

    /// Web API answered `ok: false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// Web API rate limit hit; seconds to wait when Slack said so
    #[error("Slack API rate limited")]
    RateLimited(Option<u64>),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SlackError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
