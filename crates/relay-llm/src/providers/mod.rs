//! Concrete LLM provider implementations

pub mod anthropic;
pub mod gemini;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gemini::{GeminiConfig, GeminiProvider};

const DEFAULT_TIMEOUT_SECS: u64 = 120;
