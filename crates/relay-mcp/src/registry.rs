//! Tool registry
//!
//! Owns every [`ToolSession`] of a run, built from one [`RegistryConfig`].
//! Sessions keep the config's sorted name order; that order is used for
//! connecting, for first-match tool resolution, and (reversed) for teardown.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::RegistryConfig;
use crate::error::MCPError;
use crate::session::ToolSession;

/// Outcome of [`ToolRegistry::connect_all`]
#[derive(Debug, Default)]
pub struct ConnectSummary {
    pub connected: Vec<String>,
    pub failed: Vec<(String, MCPError)>,
}

impl ConnectSummary {
    pub fn all_connected(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The set of tool server sessions for one run
#[derive(Debug, Default)]
pub struct ToolRegistry {
    sessions: Vec<Arc<ToolSession>>,
}

impl ToolRegistry {
    /// Build one session per configured server
    ///
    /// Any invalid entry (including the unimplemented http transport) fails
    /// the whole registry.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let sessions = config
            .servers
            .iter()
            .map(|(name, server)| ToolSession::from_config(name, server).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        info!(servers = sessions.len(), "Tool registry created");
        Ok(Self { sessions })
    }

    /// Load the config file and build the registry
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&RegistryConfig::from_file(path)?)
    }

    /// Build a registry over existing sessions, kept in the given order
    pub fn from_sessions(sessions: Vec<Arc<ToolSession>>) -> Self {
        Self { sessions }
    }

    /// Connect every session
    ///
    /// Each server connects independently; a failure is logged and recorded
    /// in the summary while the remaining servers still connect.
    pub async fn connect_all(&self) -> ConnectSummary {
        let mut summary = ConnectSummary::default();

        for session in &self.sessions {
            match session.connect().await {
                Ok(()) => summary.connected.push(session.name().to_string()),
                Err(e) => {
                    warn!(
                        server = session.name(),
                        error = %e,
                        "Failed to connect to MCP server. Continuing without it."
                    );
                    summary.failed.push((session.name().to_string(), e));
                }
            }
        }

        info!(
            connected = summary.connected.len(),
            total = self.sessions.len(),
            "Connected to MCP servers"
        );
        summary
    }

    /// All sessions regardless of connection state
    pub fn sessions(&self) -> &[Arc<ToolSession>] {
        &self.sessions
    }

    /// Sessions whose connect succeeded, in registry order
    pub fn connected_sessions(&self) -> Vec<Arc<ToolSession>> {
        self.sessions
            .iter()
            .filter(|session| session.is_connected())
            .cloned()
            .collect()
    }

    /// Look up a session by server name
    pub fn session(&self, name: &str) -> Option<&Arc<ToolSession>> {
        self.sessions.iter().find(|session| session.name() == name)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Tear down every session, last acquired first
    ///
    /// Every session's teardown runs even when an earlier one fails; the
    /// failures are reported together. Calling this again is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        let mut failures = Vec::new();

        for session in self.sessions.iter().rev() {
            if let Err(e) = session.shutdown().await {
                warn!(server = session.name(), error = %e, "Error disconnecting from MCP server");
                failures.push(format!("{}: {e}", session.name()));
            }
        }

        if failures.is_empty() {
            debug!("All MCP sessions released");
            Ok(())
        } else {
            Err(MCPError::DisconnectionFailed(failures.join("; ")))
        }
    }
}

/// First session, in slice order, whose current tool list has `tool_name`
///
/// Sessions whose tool listing fails are skipped with a warning.
pub async fn find_tool_owner<'a>(
    sessions: &'a [Arc<ToolSession>],
    tool_name: &str,
) -> Option<&'a Arc<ToolSession>> {
    for session in sessions {
        match session.list_tools().await {
            Ok(tools) if tools.iter().any(|tool| tool.name == tool_name) => {
                debug!(server = session.name(), tool = tool_name, "Resolved tool owner");
                return Some(session);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(server = session.name(), error = %e, "Failed to list tools during resolution");
            }
        }
    }
    None
}
