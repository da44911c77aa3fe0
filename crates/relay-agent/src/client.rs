//! Client facade
//!
//! [`McpClient`] pairs one [`ToolRegistry`] with one [`Agent`] and answers
//! queries over the registry's connected sessions. Front ends depend on the
//! [`QueryService`] trait rather than the concrete client.

use async_trait::async_trait;
use relay_mcp::{MCPError, ToolRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::adapter::{AdapterSettings, Agent};
use crate::error::{AgentError, Result};
use crate::factory::create_agent;
use crate::orchestrator::{MAX_DEPTH, QueryOptions};

/// The one operation front ends need
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn answer(&self, query: &str) -> Result<String>;
}

/// Tool registry plus agent
pub struct McpClient {
    registry: Arc<ToolRegistry>,
    agent: Arc<dyn Agent>,
    max_rounds: usize,
    timeout: Option<Duration>,
}

impl McpClient {
    pub fn new(registry: Arc<ToolRegistry>, agent: Arc<dyn Agent>) -> Self {
        Self {
            registry,
            agent,
            max_rounds: MAX_DEPTH,
            timeout: None,
        }
    }

    /// Client whose agent is picked by provider name
    pub fn from_provider(
        registry: Arc<ToolRegistry>,
        provider: &str,
        settings: AdapterSettings,
    ) -> Result<Self> {
        Ok(Self::new(registry, create_agent(provider, settings)?))
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Per-query time limit
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Options applied by [`answer`](Self::answer)
    pub fn default_options(&self) -> QueryOptions {
        let options = QueryOptions::default().with_max_rounds(self.max_rounds);
        match self.timeout {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn provider(&self) -> &'static str {
        self.agent.provider()
    }

    /// Answer using every connected server's tools
    pub async fn answer(&self, query: &str) -> Result<String> {
        self.answer_with(query, self.default_options()).await
    }

    pub async fn answer_with(&self, query: &str, options: QueryOptions) -> Result<String> {
        let sessions = self.registry.connected_sessions();
        debug!(servers = sessions.len(), "Answering query");
        self.agent.process_query(query, &sessions, &options).await
    }

    /// Answer using one named server's tools only
    pub async fn answer_on(&self, server: &str, query: &str) -> Result<String> {
        let session = self
            .registry
            .session(server)
            .ok_or_else(|| AgentError::UnknownServer(server.to_string()))?;

        if !session.is_connected() {
            return Err(MCPError::NotConnected(server.to_string()).into());
        }

        info!(server, "Answering query on a single server");
        let sessions = [Arc::clone(session)];
        self.agent
            .process_query(query, &sessions, &self.default_options())
            .await
    }

    /// Release every tool server
    pub async fn shutdown(&self) -> Result<()> {
        self.registry.shutdown().await?;
        Ok(())
    }
}

#[async_trait]
impl QueryService for McpClient {
    async fn answer(&self, query: &str) -> Result<String> {
        McpClient::answer(self, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_mcp::{Tool, ToolResult, ToolSession, Transport};
    use serde_json::Value;

    mockall::mock! {
        pub Assistant {}

        #[async_trait]
        impl Agent for Assistant {
            fn provider(&self) -> &'static str;
            async fn process_query(
                &self,
                query: &str,
                sessions: &[Arc<ToolSession>],
                options: &QueryOptions,
            ) -> Result<String>;
        }
    }

    /// Transport whose connect succeeds or fails as configured
    struct Reachable(bool);

    #[async_trait]
    impl Transport for Reachable {
        async fn connect(&self) -> relay_mcp::Result<()> {
            if self.0 {
                Ok(())
            } else {
                Err(MCPError::ConnectionFailed("spawn failed".into()))
            }
        }
        fn is_connected(&self) -> bool {
            self.0
        }
        async fn close(&self) -> relay_mcp::Result<()> {
            Ok(())
        }
        async fn list_tools(&self) -> relay_mcp::Result<Vec<Tool>> {
            Ok(vec![])
        }
        async fn call_tool(&self, _name: &str, _arguments: Value) -> relay_mcp::Result<ToolResult> {
            Ok(ToolResult::default())
        }
    }

    async fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::from_sessions(vec![
            Arc::new(ToolSession::with_transport("down", Arc::new(Reachable(false)))),
            Arc::new(ToolSession::with_transport("up", Arc::new(Reachable(true)))),
        ]);
        registry.connect_all().await;
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_answer_uses_connected_sessions() {
        let mut agent = MockAssistant::new();
        agent
            .expect_process_query()
            .withf(|query, sessions, options| {
                query == "hello"
                    && sessions.len() == 1
                    && sessions[0].name() == "up"
                    && options.max_rounds == 3
                    && options.deadline.is_some()
            })
            .times(1)
            .returning(|_, _, _| Ok("hi".to_string()));

        let client = McpClient::new(registry().await, Arc::new(agent))
            .with_max_rounds(3)
            .with_timeout(Duration::from_secs(30));

        let service: &dyn QueryService = &client;
        assert_eq!(service.answer("hello").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn test_answer_on_named_server() {
        let mut agent = MockAssistant::new();
        agent
            .expect_process_query()
            .withf(|_, sessions, _| sessions.len() == 1 && sessions[0].name() == "up")
            .times(1)
            .returning(|_, _, _| Ok("routed".to_string()));

        let client = McpClient::new(registry().await, Arc::new(agent));
        assert_eq!(client.answer_on("up", "q").await.unwrap(), "routed");
    }

    #[tokio::test]
    async fn test_answer_on_unknown_or_disconnected_server() {
        let mut agent = MockAssistant::new();
        agent.expect_process_query().never();

        let client = McpClient::new(registry().await, Arc::new(agent));

        let err = client.answer_on("nope", "q").await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownServer(ref name) if name == "nope"));

        let err = client.answer_on("down", "q").await.unwrap_err();
        assert!(matches!(err, AgentError::Mcp(MCPError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_errors_pass_through_and_shutdown_is_idempotent() {
        let mut agent = MockAssistant::new();
        agent
            .expect_process_query()
            .returning(|_, _, _| Err(AgentError::ToolNotFound("lookup".into())));
        agent.expect_provider().return_const("mock");

        let client = McpClient::new(registry().await, Arc::new(agent));
        assert_eq!(client.provider(), "mock");

        let err = client.answer("q").await.unwrap_err();
        assert!(!err.is_retryable());

        client.shutdown().await.unwrap();
        client.shutdown().await.unwrap();
        assert!(client.registry().connected_sessions().is_empty());
    }

    #[test]
    fn test_from_provider_rejects_openai() {
        let result = McpClient::from_provider(
            Arc::new(ToolRegistry::default()),
            "openai",
            AdapterSettings::default(),
        );
        assert!(matches!(result, Err(AgentError::UnsupportedProvider(_))));
    }
}
