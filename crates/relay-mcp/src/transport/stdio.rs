//! Stdio transport
//!
//! Spawns the server as a child process and speaks newline-delimited
//! JSON-RPC 2.0 over its stdin/stdout. The child's stderr is inherited.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::PoisonError;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::Transport;
use crate::Result;
use crate::config::TransportConfig;
use crate::env::resolve_env;
use crate::error::MCPError;
use crate::tool::{Tool, ToolResult};

const PROTOCOL_VERSION: &str = "2024-11-05";
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Transport over a spawned child process
pub struct StdioTransport {
    server: String,
    command: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    cwd: Option<PathBuf>,

    /// Live connection; one request/response exchange holds the lock
    connection: Mutex<Option<Connection>>,
    /// Fired by `close` to abandon the exchange holding `connection`
    closing: std::sync::Mutex<CancellationToken>,

    connected: AtomicBool,
    request_id: AtomicU64,
}

/// Pipes of a running child
struct Connection {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    /// Create a transport for `command args...`
    ///
    /// `server` names the server in logs and errors. `env` values may hold
    /// `$VAR` references; they are resolved when connecting.
    pub fn new(
        server: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        env: BTreeMap<String, String>,
        cwd: Option<PathBuf>,
    ) -> Self {
        Self {
            server: server.into(),
            command: command.into(),
            args,
            env,
            cwd,
            connection: Mutex::new(None),
            closing: std::sync::Mutex::new(CancellationToken::new()),
            connected: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
        }
    }

    /// Create from a stdio transport config
    pub fn from_config(server: impl Into<String>, config: &TransportConfig) -> Result<Self> {
        match config {
            TransportConfig::Stdio {
                command,
                args,
                env,
                cwd,
            } => Ok(Self::new(
                server,
                command.clone(),
                args.clone(),
                env.clone(),
                cwd.clone(),
            )),
            other => Err(MCPError::ConfigError(format!(
                "Expected stdio transport config, got {}",
                other.kind()
            ))),
        }
    }

    fn spawn(&self) -> Result<Connection> {
        debug!(server = %self.server, command = %self.command, args = ?self.args, "Starting MCP server");

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .envs(resolve_env(&self.env))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| {
            MCPError::ConnectionFailed(format!("Failed to spawn '{}': {e}", self.command))
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.start_kill();
            return Err(MCPError::ConnectionFailed(
                "Failed to capture child stdio".to_string(),
            ));
        };

        Ok(Connection {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn closing(&self) -> CancellationToken {
        self.closing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One request/response exchange on an open connection
    ///
    /// Fails with `ConnectionFailed` as soon as [`Transport::close`] starts.
    async fn exchange(
        &self,
        connection: &mut Connection,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        let closing = self.closing();
        let id = self.request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let exchange = async {
            trace!(server = %self.server, method, id, "Sending request");
            connection
                .write_message(&json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": method,
                    "params": params,
                }))
                .await?;

            connection.read_response(id, method).await
        };

        tokio::select! {
            biased;
            () = closing.cancelled() => {
                warn!(server = %self.server, method, id, "Request abandoned, transport closing");
                Err(MCPError::ConnectionFailed(format!("{method}: transport closed")))
            }
            result = exchange => result,
        }
    }

    async fn handshake(&self, connection: &mut Connection) -> Result<()> {
        let result = self
            .exchange(
                connection,
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION"),
                    }
                }),
            )
            .await?;

        info!(
            server = %self.server,
            remote = result["serverInfo"]["name"].as_str().unwrap_or("unknown"),
            version = result["serverInfo"]["version"].as_str().unwrap_or("unknown"),
            "Connected to MCP server"
        );

        connection
            .write_message(&json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized",
            }))
            .await
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| MCPError::NotConnected(self.server.clone()))?;

        self.exchange(connection, method, params).await
    }
}

impl Connection {
    async fn write_message(&mut self, message: &Value) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| MCPError::ConnectionFailed(e.to_string()))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| MCPError::ConnectionFailed(e.to_string()))
    }

    async fn read_response(&mut self, id: u64, method: &str) -> Result<Value> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| MCPError::ConnectionFailed(e.to_string()))?;

            if read == 0 {
                return Err(MCPError::ConnectionFailed(
                    "Server closed connection".to_string(),
                ));
            }

            match parse_frame(&line, id, method) {
                Frame::Response(result) => return result,
                Frame::Skip => trace!(id, "Skipping unrelated line"),
            }
        }
    }

    /// Close stdin, give the child a moment to exit, then kill it
    async fn shutdown(self) -> Result<()> {
        let Self {
            mut child, stdin, ..
        } = self;
        drop(stdin);

        if tokio::time::timeout(EXIT_GRACE, child.wait()).await.is_ok() {
            return Ok(());
        }

        child
            .kill()
            .await
            .map_err(|e| MCPError::DisconnectionFailed(e.to_string()))
    }
}

/// Outcome of reading one line while waiting for response `id`
enum Frame {
    /// Not the awaited response (notification, server request, noise)
    Skip,
    Response(Result<Value>),
}

fn parse_frame(line: &str, id: u64, method: &str) -> Frame {
    let Ok(message) = serde_json::from_str::<Value>(line.trim()) else {
        return Frame::Skip;
    };

    if message.get("method").is_some() || message.get("id").and_then(Value::as_u64) != Some(id) {
        return Frame::Skip;
    }

    if let Some(error) = message.get("error") {
        return Frame::Response(Err(MCPError::RequestFailed(format!("{method}: {error}"))));
    }

    Frame::Response(
        message
            .get("result")
            .cloned()
            .ok_or_else(|| MCPError::RequestFailed(format!("{method}: no result in response"))),
    )
}

#[async_trait]
impl Transport for StdioTransport {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        *self.closing.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();

        let mut connection = self.spawn()?;
        match self.handshake(&mut connection).await {
            Ok(()) => {
                *guard = Some(connection);
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                // release the half-open child before reporting
                let _ = connection.shutdown().await;
                Err(e)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        // release an exchange still holding the connection
        self.closing().cancel();

        let connection = self.connection.lock().await.take();
        match connection {
            Some(connection) => {
                debug!(server = %self.server, "Stopping MCP server");
                connection.shutdown().await
            }
            None => Ok(()),
        }
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.request("tools/list", json!({})).await?;

        serde_json::from_value(result["tools"].clone())
            .map_err(|e| MCPError::RequestFailed(format!("Failed to parse tools: {e}")))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResult> {
        let result = self
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;

        serde_json::from_value(result)
            .map_err(|e| MCPError::ToolCallFailed(format!("Failed to parse result: {e}")))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // Best effort; kill_on_drop covers the remaining cases
        self.closing().cancel();
        if let Ok(mut guard) = self.connection.try_lock() {
            if let Some(connection) = guard.as_mut() {
                let _ = connection.child.start_kill();
            }
        }
    }
}
