//! Provider adapter abstraction
//!
//! An [`AgentAdapter`] translates between the provider-neutral loop and one
//! model API: tool schemas out, generations in, tool results folded back
//! into that provider's conversation shape. The loop itself lives in
//! [`crate::orchestrator`].

use async_trait::async_trait;
use relay_mcp::{Tool, ToolResult, ToolSession};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::{AgentError, Result};
use crate::orchestrator::{QueryOptions, process_query};

/// A tool invocation extracted from one assistant turn
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    /// Correlates the call with its result
    pub id: String,
    pub name: String,
    /// Argument object
    pub args: Value,
}

/// Outcome of one generation call
#[derive(Debug, Clone)]
pub struct Generation<R, P> {
    /// Provider response as received
    pub raw: R,
    /// True iff at least one part is a tool-invocation directive
    pub has_tool_call: bool,
    /// Parts of the assistant turn, in order
    pub parts: Vec<P>,
}

/// Generation settings shared by every adapter
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterSettings {
    /// Model name; each adapter has its own default
    pub model: Option<String>,
    pub max_tokens: u32,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1000,
            system_prompt: None,
            temperature: None,
        }
    }
}

impl AdapterSettings {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Provider-specific half of the orchestration loop
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// One conversation turn in the provider's shape
    type Message: Send + Sync + 'static;
    /// One tool schema in the provider's shape
    type Tool: Send + Sync + 'static;
    /// One part of an assistant turn
    type Part: Send + Sync + 'static;
    /// Raw generation response
    type Response: Send + 'static;

    /// Provider name, for logs
    fn provider(&self) -> &'static str;

    /// List every session's tools and translate them to provider schemas
    async fn prepare_tools(&self, sessions: &[Arc<ToolSession>]) -> Result<Vec<Self::Tool>>;

    /// First turn of a conversation
    fn user_message(&self, query: &str) -> Self::Message;

    /// One model call
    async fn generate(
        &self,
        conversation: &[Self::Message],
        tools: &[Self::Tool],
    ) -> Result<Generation<Self::Response, Self::Part>>;

    /// Assistant turn holding the generated parts unchanged
    fn assistant_message(&self, parts: Vec<Self::Part>) -> Self::Message;

    /// Every well-formed tool directive among `parts`
    fn extract_tool_calls(&self, parts: &[Self::Part]) -> Vec<ToolCall>;

    /// Append a tool's output in the shape the next request expects
    fn integrate_tool_result(
        &self,
        conversation: &mut Vec<Self::Message>,
        call: &ToolCall,
        result: &ToolResult,
    );

    /// Text of a part, `None` for structural parts
    fn part_text<'a>(&self, part: &'a Self::Part) -> Option<&'a str>;
}

/// Object-safe face of an adapter, for picking a provider at runtime
#[async_trait]
pub trait Agent: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Answer one query with the given sessions' tools
    async fn process_query(
        &self,
        query: &str,
        sessions: &[Arc<ToolSession>],
        options: &QueryOptions,
    ) -> Result<String>;
}

#[async_trait]
impl<T: AgentAdapter> Agent for T {
    fn provider(&self) -> &'static str {
        AgentAdapter::provider(self)
    }

    async fn process_query(
        &self,
        query: &str,
        sessions: &[Arc<ToolSession>],
        options: &QueryOptions,
    ) -> Result<String> {
        process_query(self, query, sessions, options).await
    }
}

/// Tools of every session, in session order
///
/// When two servers expose the same tool name the first keeps it; calls
/// resolve to that server, and the shadowed one is logged.
pub async fn collect_tools(sessions: &[Arc<ToolSession>]) -> Result<Vec<Tool>> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut tools = Vec::new();

    for session in sessions {
        for tool in session.list_tools().await? {
            if let Some(owner) = owners.get(&tool.name) {
                warn!(
                    tool = %tool.name,
                    server = owner.as_str(),
                    shadowed = session.name(),
                    "Tool name exposed by several servers, calls go to the first"
                );
                continue;
            }
            owners.insert(tool.name.clone(), session.name().to_string());
            tools.push(tool);
        }
    }

    Ok(tools)
}

/// Argument object of a tool directive
///
/// Missing arguments become `{}`. Anything other than an object is not a
/// usable directive.
pub(crate) fn call_arguments(tool: &str, input: &Value) -> Option<Value> {
    match input {
        Value::Object(_) => Some(input.clone()),
        Value::Null => Some(Value::Object(serde_json::Map::new())),
        other => {
            warn!(tool, arguments = %other, "Skipping tool call with non-object arguments");
            None
        }
    }
}

/// Aborts the task when dropped, so a cancelled query does not leave its
/// model call running
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run a model call as its own runtime task and await it
pub(crate) async fn offload<F, T>(call: F) -> Result<T>
where
    F: Future<Output = relay_llm::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let mut task = AbortOnDrop(tokio::spawn(call));
    let joined = (&mut task.0)
        .await
        .map_err(|e| AgentError::TaskFailed(e.to_string()))?;
    Ok(joined?)
}
