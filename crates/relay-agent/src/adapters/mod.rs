//! Concrete [`AgentAdapter`](crate::AgentAdapter) variants, one per provider

pub mod anthropic;
pub mod gemini;

pub use anthropic::AnthropicAdapter;
pub use gemini::GeminiAdapter;
