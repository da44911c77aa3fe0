//! Configuration types for tool servers
//!
//! The configuration file maps server names to transport settings. The
//! mapping may sit at the top level or under an `mcpServers` key:
//!
//! ```json
//! {
//!   "weather": {
//!     "transport": "stdio",
//!     "command": "python",
//!     "args": ["weather_server.py"],
//!     "env": {"WEATHER_TOKEN": "$WEATHER_TOKEN"},
//!     "keywords": ["forecast", "rain"]
//!   }
//! }
//! ```
//!
//! `transport` defaults to `stdio` when omitted.

use crate::Result;
use crate::error::MCPError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const KNOWN_TRANSPORTS: &[&str] = &["stdio", "http"];
const DEFAULT_TRANSPORT: &str = "stdio";

/// All configured tool servers, keyed by server name
///
/// Iteration order is the sorted name order; the registry uses it for
/// first-match tool resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistryConfig {
    pub servers: BTreeMap<String, ServerConfig>,
}

/// One server entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Transport settings
    #[serde(flatten)]
    pub transport: TransportConfig,

    /// Extra routing keywords for the keyword pre-filter
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// Transport variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Local subprocess speaking JSON-RPC over stdin/stdout
    Stdio {
        /// Command to execute
        command: String,

        /// Command arguments
        #[serde(default)]
        args: Vec<String>,

        /// Environment for the child; `$VAR` / `${VAR}` values are resolved at connect time
        #[serde(default)]
        env: BTreeMap<String, String>,

        /// Working directory (optional)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<PathBuf>,
    },

    /// Remote server over HTTP (not implemented)
    Http {
        /// Server URL
        url: String,

        /// HTTP headers
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl TransportConfig {
    /// Transport name as written in the configuration file
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stdio { .. } => "stdio",
            Self::Http { .. } => "http",
        }
    }
}

impl ServerConfig {
    /// Stdio entry with no env, cwd or keywords
    pub fn stdio(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            transport: TransportConfig::Stdio {
                command: command.into(),
                args,
                env: BTreeMap::new(),
                cwd: None,
            },
            keywords: Vec::new(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a file
    ///
    /// A missing or unreadable file is a configuration error, as is any
    /// malformed entry.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MCPError::ConfigError(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content)
            .map_err(|e| MCPError::ConfigError(format!("Failed to parse config file: {e}")))?;

        let Value::Object(mut root) = root else {
            return Err(MCPError::ConfigError(
                "Config root must be a JSON object of servers".to_string(),
            ));
        };

        let entries = match root.remove("mcpServers") {
            Some(Value::Object(servers)) => servers,
            Some(_) => {
                return Err(MCPError::ConfigError(
                    "`mcpServers` must be a JSON object".to_string(),
                ));
            }
            None => root,
        };

        let mut servers = BTreeMap::new();
        for (name, entry) in entries {
            let config = parse_entry(&name, entry)?;
            servers.insert(name, config);
        }

        Ok(Self { servers })
    }

    /// Number of configured servers
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no servers are configured
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

fn parse_entry(name: &str, entry: Value) -> Result<ServerConfig> {
    let Value::Object(mut fields) = entry else {
        return Err(MCPError::ConfigError(format!(
            "Server '{name}' must be a JSON object"
        )));
    };

    let transport = transport_name(name, &fields)?;
    if !KNOWN_TRANSPORTS.contains(&transport.as_str()) {
        return Err(MCPError::UnsupportedTransport(format!(
            "{transport} (server '{name}')"
        )));
    }
    fields.insert("transport".to_string(), Value::String(transport));

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| MCPError::ConfigError(format!("Invalid entry for server '{name}': {e}")))
}

fn transport_name(name: &str, fields: &Map<String, Value>) -> Result<String> {
    match fields.get("transport") {
        None => Ok(DEFAULT_TRANSPORT.to_string()),
        Some(Value::String(transport)) => Ok(transport.to_lowercase()),
        Some(other) => Err(MCPError::ConfigError(format!(
            "Server '{name}': transport must be a string, got {other}"
        ))),
    }
}
