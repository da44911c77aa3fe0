//! # relay-mcp
//!
//! Sessions with MCP tool servers for mcp-relay.
//!
//! - [`ToolSession`]: one connection to one server, with tool discovery and
//!   retried tool invocation
//! - [`ToolRegistry`]: every session of a run, built from a config file,
//!   connected and torn down as a unit
//! - [`StdioTransport`]: JSON-RPC 2.0 over a spawned child's stdin/stdout
//!
//! ```no_run
//! use relay_mcp::ToolRegistry;
//!
//! # async fn run() -> relay_mcp::Result<()> {
//! let registry = ToolRegistry::from_file("config.json")?;
//! let summary = registry.connect_all().await;
//! for (server, error) in &summary.failed {
//!     eprintln!("{server} unavailable: {error}");
//! }
//!
//! for session in registry.connected_sessions() {
//!     for tool in session.list_tools().await? {
//!         println!("{}: {}", session.name(), tool.name);
//!     }
//! }
//!
//! registry.shutdown().await
//! # }
//! ```

pub mod config;
pub mod env;
pub mod error;
pub mod registry;
pub mod retry;
pub mod session;
pub mod tool;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use config::{RegistryConfig, ServerConfig, TransportConfig};
pub use error::MCPError;
pub use registry::{ConnectSummary, ToolRegistry, find_tool_owner};
pub use retry::RetryPolicy;
pub use session::ToolSession;
pub use tool::{Tool, ToolContent, ToolResult};
pub use transport::{StdioTransport, Transport};

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, MCPError>;
