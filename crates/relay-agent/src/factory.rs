//! Provider selection by name

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::adapter::{AdapterSettings, Agent};
use crate::adapters::{AnthropicAdapter, GeminiAdapter};
use crate::error::{AgentError, Result};

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    Gemini,
}

impl FromStr for ProviderKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            "openai" => Err(AgentError::UnsupportedProvider(
                "OpenAI is not supported yet".to_string(),
            )),
            other => Err(AgentError::UnsupportedProvider(format!(
                "Unsupported provider: {other}"
            ))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

/// Build the agent for `provider`, reading its API key from the environment
///
/// Fails before any network traffic when the name is unsupported or the key
/// is missing.
pub fn create_agent(provider: &str, settings: AdapterSettings) -> Result<Arc<dyn Agent>> {
    let kind: ProviderKind = provider.parse()?;

    let agent: Arc<dyn Agent> = match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicAdapter::from_env(settings)?),
        ProviderKind::Gemini => Arc::new(GeminiAdapter::from_env(settings)?),
    };

    info!(provider = %kind, "Agent created");
    Ok(agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_llm::LLMError;

    #[test]
    fn test_provider_names() {
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!(" Claude ".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("GEMINI".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert_eq!(ProviderKind::Gemini.to_string(), "gemini");
    }

    #[test]
    fn test_openai_is_an_explicit_stub() {
        let Err(err) = create_agent("openai", AdapterSettings::default()) else {
            panic!("openai must not construct");
        };
        assert_eq!(err.to_string(), "OpenAI is not supported yet");
    }

    #[test]
    fn test_unknown_provider() {
        let Err(err) = create_agent("mistral", AdapterSettings::default()) else {
            panic!("unknown provider must not construct");
        };
        assert!(matches!(err, AgentError::UnsupportedProvider(_)));
        assert_eq!(err.to_string(), "Unsupported provider: mistral");
    }

    #[test]
    fn test_missing_key_fails_construction() {
        // SAFETY: This is a test that modifies env vars, which is safe in single-threaded test context
        unsafe {
            std::env::remove_var("GEMINI_API_KEY");
            std::env::remove_var("GOOGLE_API_KEY");
        }
        let Err(err) = create_agent("gemini", AdapterSettings::default()) else {
            panic!("gemini without a key must not construct");
        };
        assert!(matches!(err, AgentError::Llm(LLMError::ConfigurationError(_))));
    }
}
