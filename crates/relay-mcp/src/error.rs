//! Error types for tool-server operations

use thiserror::Error;

/// Errors that can occur while talking to MCP tool servers
#[derive(Error, Debug)]
pub enum MCPError {
    /// Configuration error (bad file, bad entry)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Transport name not recognised
    #[error("Unsupported transport type: {0}")]
    UnsupportedTransport(String),

    /// Transport recognised but not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Spawning or handshaking with the server failed
    #[error("MCP connection failed: {0}")]
    ConnectionFailed(String),

    /// Operation requires a connected session
    #[error("Not connected to MCP server: {0}")]
    NotConnected(String),

    /// JSON-RPC request failed
    #[error("MCP request failed: {0}")]
    RequestFailed(String),

    /// Tool result could not be interpreted
    #[error("MCP tool call failed: {0}")]
    ToolCallFailed(String),

    /// Releasing one or more sessions failed
    #[error("MCP disconnection failed: {0}")]
    DisconnectionFailed(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl MCPError {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::RequestFailed(_) | Self::IoError(_)
        )
    }
}
