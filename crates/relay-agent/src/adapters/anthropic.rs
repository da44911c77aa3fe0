//! Anthropic Messages adapter
//!
//! Tools map to `tools[]` entries, directives are `tool_use` blocks, and
//! every result of one round goes into a single user turn of `tool_result`
//! blocks.

use async_trait::async_trait;
use relay_llm::providers::anthropic::{AnthropicProvider, MessagesRequest, MessagesResponse};
use relay_llm::{ContentBlock, LLMProvider, Message, MessageContent, ToolDefinition};
use relay_mcp::{ToolResult, ToolSession};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::adapter::{
    AdapterSettings, AgentAdapter, Generation, ToolCall, call_arguments, collect_tools, offload,
};
use crate::error::Result;

pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Adapter over an Anthropic Messages client
pub struct AnthropicAdapter<P = AnthropicProvider> {
    provider: Arc<P>,
    model: String,
    settings: AdapterSettings,
}

impl AnthropicAdapter {
    /// Adapter over a provider configured from `ANTHROPIC_API_KEY`
    pub fn from_env(settings: AdapterSettings) -> Result<Self> {
        Ok(Self::new(Arc::new(AnthropicProvider::from_env()?), settings))
    }
}

impl<P> AnthropicAdapter<P>
where
    P: LLMProvider<Request = MessagesRequest, Response = MessagesResponse>,
{
    pub fn new(provider: Arc<P>, settings: AdapterSettings) -> Self {
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());

        Self {
            provider,
            model,
            settings,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Text handed back to the model for a normalised result
fn result_content(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[async_trait]
impl<P> AgentAdapter for AnthropicAdapter<P>
where
    P: LLMProvider<Request = MessagesRequest, Response = MessagesResponse>,
{
    type Message = Message;
    type Tool = ToolDefinition;
    type Part = ContentBlock;
    type Response = MessagesResponse;

    fn provider(&self) -> &'static str {
        "anthropic"
    }

    async fn prepare_tools(&self, sessions: &[Arc<ToolSession>]) -> Result<Vec<ToolDefinition>> {
        let tools = collect_tools(sessions).await?;

        Ok(tools
            .into_iter()
            .map(|tool| {
                let description = tool.description().to_string();
                ToolDefinition::new(tool.name, description, tool.input_schema)
            })
            .collect())
    }

    fn user_message(&self, query: &str) -> Message {
        Message::user(query)
    }

    async fn generate(
        &self,
        conversation: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<Generation<MessagesResponse, ContentBlock>> {
        let request = MessagesRequest {
            model: self.model.clone(),
            messages: conversation.to_vec(),
            system: self.settings.system_prompt.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            tools: tools.to_vec(),
        };

        let provider = Arc::clone(&self.provider);
        let response = offload(async move { provider.send(request).await }).await?;

        let has_tool_call = response
            .content
            .iter()
            .any(|block| matches!(block, ContentBlock::ToolUse { .. }));
        debug!(
            blocks = response.content.len(),
            has_tool_call, "Anthropic generation finished"
        );

        Ok(Generation {
            parts: response.content.clone(),
            has_tool_call,
            raw: response,
        })
    }

    fn assistant_message(&self, parts: Vec<ContentBlock>) -> Message {
        Message::assistant(parts)
    }

    /// Every `tool_use` block must be answered by a `tool_result`, so one
    /// unusable block voids the whole turn
    fn extract_tool_calls(&self, parts: &[ContentBlock]) -> Vec<ToolCall> {
        parts
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => Some((id, name, input)),
                _ => None,
            })
            .map(|(id, name, input)| {
                call_arguments(name, input).map(|args| ToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    args,
                })
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }

    fn integrate_tool_result(
        &self,
        conversation: &mut Vec<Message>,
        call: &ToolCall,
        result: &ToolResult,
    ) {
        let block = ContentBlock::tool_result(
            &call.id,
            result_content(result.normalized()),
            result.is_error(),
        );

        // results of one round share a single user turn
        if conversation.last().is_some_and(Message::is_tool_result_turn) {
            if let Some(Message {
                content: MessageContent::Blocks(blocks),
                ..
            }) = conversation.last_mut()
            {
                blocks.push(block);
                return;
            }
        }

        conversation.push(Message::tool_results(vec![block]));
    }

    fn part_text<'a>(&self, part: &'a ContentBlock) -> Option<&'a str> {
        match part {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}
