//! LLM provider trait definition

use crate::Result;
use async_trait::async_trait;

/// A client for one provider's generation endpoint
///
/// Requests and responses are the provider's own wire types; translating
/// to and from a conversation is the caller's business.
#[async_trait]
pub trait LLMProvider: Send + Sync + 'static {
    /// Request body for one generation call
    type Request: Send + 'static;

    /// Parsed response of one generation call
    type Response: Send + 'static;

    /// Issue one generation call
    async fn send(&self, request: Self::Request) -> Result<Self::Response>;

    /// Get the provider name (e.g., "anthropic", "gemini")
    fn name(&self) -> &'static str;
}
