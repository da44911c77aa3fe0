//! Error types for agent operations

use relay_llm::LLMError;
use relay_mcp::MCPError;
use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Tool server failure (config, connection, invocation)
    #[error(transparent)]
    Mcp(#[from] MCPError),

    /// Model call failure
    #[error(transparent)]
    Llm(#[from] LLMError),

    /// The model asked for a tool no connected server exposes
    #[error("No server exposes tool '{0}'")]
    ToolNotFound(String),

    /// No server with this name in the registry
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    /// Provider name not supported
    #[error("{0}")]
    UnsupportedProvider(String),

    /// Offloaded model call panicked or was aborted
    #[error("Worker task failed: {0}")]
    TaskFailed(String),

    /// Query cancelled by the caller
    #[error("Query cancelled")]
    Cancelled,

    /// Query ran past its deadline
    #[error("Query deadline exceeded")]
    DeadlineExceeded,
}

/// Coarse error category for callers deciding how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Trying the same query again may succeed
    Retryable,
    /// Retrying will not help
    Fatal,
}

impl AgentError {
    pub fn class(&self) -> ErrorClass {
        let retryable = match self {
            Self::Mcp(e) => e.is_retryable(),
            Self::Llm(e) => e.is_retryable(),
            Self::DeadlineExceeded => true,
            _ => false,
        };

        if retryable {
            ErrorClass::Retryable
        } else {
            ErrorClass::Fatal
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(
            AgentError::from(MCPError::ConnectionFailed("pipe".into())).class(),
            ErrorClass::Retryable
        );
        assert_eq!(
            AgentError::from(LLMError::RateLimitExceeded("429".into())).class(),
            ErrorClass::Retryable
        );
        assert_eq!(AgentError::DeadlineExceeded.class(), ErrorClass::Retryable);

        assert_eq!(AgentError::ToolNotFound("lookup".into()).class(), ErrorClass::Fatal);
        assert_eq!(AgentError::Cancelled.class(), ErrorClass::Fatal);
        assert_eq!(
            AgentError::from(LLMError::AuthenticationFailed).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AgentError::ToolNotFound("lookup".into()).to_string(),
            "No server exposes tool 'lookup'"
        );
        assert_eq!(
            AgentError::from(MCPError::NotConnected("weather".into())).to_string(),
            "Not connected to MCP server: weather"
        );
    }
}
