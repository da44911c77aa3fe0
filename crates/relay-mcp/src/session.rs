//! Tool server session
//!
//! A [`ToolSession`] owns one transport to one server. It gates discovery
//! and invocation on a completed connect, retries tool calls with its
//! [`RetryPolicy`], and releases the transport exactly once.

use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{Instrument, Span, debug, info, info_span, warn};

use crate::Result;
use crate::config::{ServerConfig, TransportConfig};
use crate::error::MCPError;
use crate::retry::RetryPolicy;
use crate::tool::{Tool, ToolResult};
use crate::transport::{StdioTransport, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Connected,
    Closed,
}

/// One live connection to a tool server
pub struct ToolSession {
    name: String,
    transport: Arc<dyn Transport>,
    retry_policy: RetryPolicy,
    keywords: Vec<String>,

    /// Lifecycle; held across connect and teardown so they never interleave
    state: Mutex<SessionState>,
    connected: AtomicBool,

    span: Span,
}

impl ToolSession {
    /// Build a session from a server config entry
    ///
    /// The http transport is recognised but not implemented and fails here.
    pub fn from_config(name: impl Into<String>, config: &ServerConfig) -> Result<Self> {
        let name = name.into();
        let transport: Arc<dyn Transport> = match &config.transport {
            TransportConfig::Stdio { .. } => {
                Arc::new(StdioTransport::from_config(&name, &config.transport)?)
            }
            TransportConfig::Http { url, .. } => {
                return Err(MCPError::NotImplemented(format!(
                    "http transport is not implemented (server '{name}' at {url})"
                )));
            }
        };

        Ok(Self::with_transport(name, transport).with_keywords(config.keywords.clone()))
    }

    /// Build a session over an existing transport
    pub fn with_transport(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        let name = name.into();
        Self {
            span: info_span!("mcp_session", server = %name),
            name,
            transport,
            retry_policy: RetryPolicy::default(),
            keywords: Vec::new(),
            state: Mutex::new(SessionState::Idle),
            connected: AtomicBool::new(false),
        }
    }

    /// Replace the retry policy used by [`Self::call_tool`]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Set the configured routing keywords
    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = keywords;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Connect the transport
    ///
    /// Connecting an already connected session is a no-op. On failure the
    /// transport is closed before the error is returned, and the session
    /// stays unconnected.
    pub async fn connect(&self) -> Result<()> {
        async {
            let mut state = self.state.lock().await;
            match *state {
                SessionState::Connected => return Ok(()),
                SessionState::Closed => {
                    return Err(MCPError::ConnectionFailed(format!(
                        "session '{}' has been shut down",
                        self.name
                    )));
                }
                SessionState::Idle => {}
            }

            if let Err(e) = self.transport.connect().await {
                if let Err(close_err) = self.transport.close().await {
                    warn!(error = %close_err, "Failed to release transport after connect failure");
                }
                return Err(e);
            }

            *state = SessionState::Connected;
            self.connected.store(true, Ordering::SeqCst);
            info!("Session connected");
            Ok(())
        }
        .instrument(self.span.clone())
        .await
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MCPError::NotConnected(self.name.clone()))
        }
    }

    /// Current tool set of the server; asks the server on every call
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_connected()?;

        async {
            let tools = self.transport.list_tools().await?;
            debug!(tools = tools.len(), "Listed tools");
            Ok(tools)
        }
        .instrument(self.span.clone())
        .await
    }

    /// Invoke a tool, retrying transient failures per the retry policy
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        self.ensure_connected()?;

        let transport = &self.transport;
        let operation = format!("tools/call {name}");

        self.retry_policy
            .execute(&operation, || transport.call_tool(name, arguments.clone()))
            .instrument(self.span.clone())
            .await
    }

    /// Release the transport
    ///
    /// Runs the release at most once; concurrent and repeated calls after
    /// the first are no-ops. A session whose connect failed has nothing left
    /// to release.
    pub async fn shutdown(&self) -> Result<()> {
        async {
            let mut state = self.state.lock().await;
            let previous = std::mem::replace(&mut *state, SessionState::Closed);
            self.connected.store(false, Ordering::SeqCst);

            match previous {
                SessionState::Connected => {
                    info!("Closing session");
                    self.transport.close().await
                }
                SessionState::Idle | SessionState::Closed => Ok(()),
            }
        }
        .instrument(self.span.clone())
        .await
    }
}

impl std::fmt::Debug for ToolSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSession")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .field("keywords", &self.keywords)
            .finish_non_exhaustive()
    }
}
