//! Agent orchestration for mcp-relay
//!
//! This crate turns a query into an answer: an [`AgentAdapter`] per model
//! provider, the tool-calling loop in [`orchestrator`], provider selection in
//! [`factory`], and the [`McpClient`] facade that front ends call through
//! [`QueryService`].
//!
//! ```no_run
//! use relay_agent::{AdapterSettings, McpClient};
//! use relay_mcp::ToolRegistry;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(ToolRegistry::from_file("config.json")?);
//! registry.connect_all().await;
//!
//! let client = McpClient::from_provider(registry, "anthropic", AdapterSettings::default())?;
//! println!("{}", client.answer("What is on my calendar today?").await?);
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod adapters;
pub mod client;
pub mod error;
pub mod factory;
pub mod orchestrator;
pub mod routing;

// Re-export key types
pub use adapter::{AdapterSettings, Agent, AgentAdapter, Generation, ToolCall, collect_tools};
pub use adapters::{AnthropicAdapter, GeminiAdapter};
pub use client::{McpClient, QueryService};
pub use error::{AgentError, ErrorClass, Result};
pub use factory::{ProviderKind, create_agent};
pub use orchestrator::{MAX_DEPTH, QueryOptions, process_query};
pub use routing::{KeywordRouter, ServerKeywords};
