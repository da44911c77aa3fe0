//! Error types for LLM operations

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for LLM operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LLMError {
    /// API request failed
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Invalid API key or authentication failed
    #[error("Invalid API key or authentication failed")]
    AuthenticationFailed,

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Provider is overloaded or down (5xx)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected response format
    #[error("Unexpected response format: {0}")]
    UnexpectedResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: StatusCode, body: String, model: &str) -> Self {
        match status.as_u16() {
            401 | 403 => Self::AuthenticationFailed,
            429 => Self::RateLimitExceeded(body),
            400 => Self::InvalidRequest(body),
            404 => Self::ModelNotFound(model.to_string()),
            500..=599 => Self::ServiceUnavailable(format!("HTTP {status}: {body}")),
            _ => Self::RequestFailed(format!("HTTP {status}: {body}")),
        }
    }

    /// Whether the same request may succeed later
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) | Self::ServiceUnavailable(_) => true,
            Self::HttpError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let model = "claude-3-5-sonnet-20241022";
        assert!(matches!(
            LLMError::from_status(StatusCode::UNAUTHORIZED, String::new(), model),
            LLMError::AuthenticationFailed
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into(), model),
            LLMError::RateLimitExceeded(ref body) if body == "slow down"
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::BAD_REQUEST, "bad".into(), model),
            LLMError::InvalidRequest(_)
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::NOT_FOUND, String::new(), model),
            LLMError::ModelNotFound(ref m) if m == model
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::BAD_GATEWAY, String::new(), model),
            LLMError::ServiceUnavailable(_)
        ));
        assert!(matches!(
            LLMError::from_status(StatusCode::IM_A_TEAPOT, String::new(), model),
            LLMError::RequestFailed(_)
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(LLMError::RateLimitExceeded("429".into()).is_retryable());
        assert!(LLMError::ServiceUnavailable("529 overloaded".into()).is_retryable());
        assert!(!LLMError::AuthenticationFailed.is_retryable());
        assert!(!LLMError::InvalidRequest("schema".into()).is_retryable());
        assert!(!LLMError::ConfigurationError("no key".into()).is_retryable());
    }
}
