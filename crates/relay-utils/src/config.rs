//! Environment-driven settings
//!
//! Both front ends read the same variables. A `.env` file in the working
//! directory is loaded first; variables already set in the process win.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },

    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Slack credentials and listen address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub bot_token: Option<String>,
    pub signing_secret: Option<String>,
    /// Address for the Events API webhook (default: "0.0.0.0:8000")
    pub bind_addr: String,
}

impl SlackSettings {
    /// Bot token and signing secret, both required to serve events
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .bot_token
            .as_deref()
            .ok_or(ConfigError::Missing("SLACK_BOT_TOKEN"))?;
        let secret = self
            .signing_secret
            .as_deref()
            .ok_or(ConfigError::Missing("SLACK_SIGNING_SECRET"))?;
        Ok((token, secret))
    }
}

/// Runtime settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Provider name (default: "anthropic")
    pub provider: String,
    /// Model override; each provider has its own default
    pub model: Option<String>,
    /// Generation limit per model call (default: 1000)
    pub max_tokens: u32,
    /// Tool server config file (default: "config.json")
    pub mcp_config: PathBuf,
    pub system_prompt_file: Option<PathBuf>,
    /// Round limit per query (default: 5)
    pub max_rounds: usize,
    pub query_timeout: Option<Duration>,
    pub slack: SlackSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            max_tokens: 1000,
            mcp_config: PathBuf::from("config.json"),
            system_prompt_file: None,
            max_rounds: 5,
            query_timeout: None,
            slack: SlackSettings {
                bot_token: None,
                signing_secret: None,
                bind_addr: "0.0.0.0:8000".to_string(),
            },
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

impl Settings {
    /// Load `.env`, then read settings from the process environment
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => debug!(error = %e, "Ignoring unreadable .env file"),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let query_timeout = match get("QUERY_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_var(
                "QUERY_TIMEOUT_SECS",
                Some(raw),
                0,
            )?)),
            None => None,
        };

        Ok(Self {
            provider: get("LLM_PROVIDER").unwrap_or(defaults.provider),
            model: get("LLM_MODEL"),
            max_tokens: parse_var("LLM_MAX_TOKENS", get("LLM_MAX_TOKENS"), defaults.max_tokens)?,
            mcp_config: get("MCP_CONFIG").map_or(defaults.mcp_config, PathBuf::from),
            system_prompt_file: get("SYSTEM_PROMPT_FILE").map(PathBuf::from),
            max_rounds: parse_var("MAX_ROUNDS", get("MAX_ROUNDS"), defaults.max_rounds)?,
            query_timeout,
            slack: SlackSettings {
                bot_token: get("SLACK_BOT_TOKEN"),
                signing_secret: get("SLACK_SIGNING_SECRET"),
                bind_addr: get("BIND_ADDR").unwrap_or(defaults.slack.bind_addr),
            },
        })
    }

    /// Contents of the system prompt file, if one is configured
    pub fn system_prompt(&self) -> Result<Option<String>> {
        self.system_prompt_file
            .as_deref()
            .map(read_prompt)
            .transpose()
    }
}

/// Read a prompt file, trimmed
pub fn read_prompt(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|text| text.trim().to_string())
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
}
