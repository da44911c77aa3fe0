//! Transports carrying JSON-RPC between a session and its server

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;
use crate::tool::{Tool, ToolResult};

pub mod stdio;

pub use stdio::StdioTransport;

/// Connection to one tool server
///
/// All methods take `&self` so a transport can be shared through `Arc`;
/// implementations keep their connection behind interior mutability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the connection and complete the protocol handshake
    async fn connect(&self) -> Result<()>;

    /// Whether the handshake completed and the connection is open
    fn is_connected(&self) -> bool;

    /// Release the connection; closing twice is a no-op
    async fn close(&self) -> Result<()>;

    /// `tools/list`
    async fn list_tools(&self) -> Result<Vec<Tool>>;

    /// `tools/call`
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult>;
}

#[cfg(test)]
mockall::mock! {
    pub Transport {}

    #[async_trait]
    impl Transport for Transport {
        async fn connect(&self) -> Result<()>;
        fn is_connected(&self) -> bool;
        async fn close(&self) -> Result<()>;
        async fn list_tools(&self) -> Result<Vec<Tool>>;
        async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult>;
    }
}
