//! LLM provider clients for mcp-relay
//!
//! This crate holds the wire-level side of model calls:
//!
//! - Anthropic Messages types ([`Message`], [`ContentBlock`], [`ToolDefinition`])
//! - The [`LLMProvider`] trait, one generation call per `send`
//! - [`providers::AnthropicProvider`] and [`providers::GeminiProvider`]
//!
//! Conversation handling lives with the agent adapters that use them.

pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;
pub mod tools;

// Re-export main types
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use provider::LLMProvider;
pub use tools::ToolDefinition;
