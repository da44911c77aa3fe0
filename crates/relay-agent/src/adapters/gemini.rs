//! Gemini `generateContent` adapter
//!
//! Tools become one `functionDeclarations` group, directives are
//! `functionCall` parts, and results travel back as `functionResponse`
//! parts of a user turn.

use async_trait::async_trait;
use relay_llm::providers::gemini::{
    Content, FunctionDeclaration, FunctionResponse, GeminiProvider, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part, Tool,
};
use relay_llm::{LLMError, LLMProvider};
use relay_mcp::{ToolResult, ToolSession};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::adapter::{
    AdapterSettings, AgentAdapter, Generation, ToolCall, call_arguments, collect_tools, offload,
};
use crate::error::Result;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Adapter over a Gemini client
pub struct GeminiAdapter<P = GeminiProvider> {
    provider: Arc<P>,
    model: String,
    settings: AdapterSettings,
}

impl GeminiAdapter {
    /// Adapter over a provider configured from `GEMINI_API_KEY`
    pub fn from_env(settings: AdapterSettings) -> Result<Self> {
        Ok(Self::new(Arc::new(GeminiProvider::from_env()?), settings))
    }
}

impl<P> GeminiAdapter<P>
where
    P: LLMProvider<Request = GenerateContentRequest, Response = GenerateContentResponse>,
{
    pub fn new(provider: Arc<P>, settings: AdapterSettings) -> Self {
        let model = settings
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());

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

/// Parameter schema as Gemini accepts it
///
/// Tools without properties get no `parameters` at all. Keywords Gemini
/// rejects are removed from every nested schema; property names are kept.
fn function_parameters(schema: &Value) -> Option<Value> {
    let has_properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|properties| !properties.is_empty());
    if !has_properties {
        return None;
    }

    let mut cleaned = schema.clone();
    strip_unsupported_keywords(&mut cleaned);
    Some(cleaned)
}

/// Keywords whose value maps names to subschemas; the names are data
const SCHEMA_MAPS: &[&str] = &["properties", "patternProperties", "$defs", "definitions"];

fn strip_unsupported_keywords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("$schema");
            map.remove("additionalProperties");
            for (key, nested) in map.iter_mut() {
                if SCHEMA_MAPS.contains(&key.as_str()) {
                    if let Value::Object(schemas) = nested {
                        schemas.values_mut().for_each(strip_unsupported_keywords);
                        continue;
                    }
                }
                strip_unsupported_keywords(nested);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(strip_unsupported_keywords),
        _ => {}
    }
}

/// `functionResponse.response` for a tool result
fn response_payload(result: &ToolResult) -> Value {
    if result.is_error() {
        return json!({"error": result.joined_text()});
    }

    match result.normalized() {
        object @ Value::Object(_) => object,
        other => json!({"result": other}),
    }
}

fn is_function_response_turn(content: &Content) -> bool {
    content.role.as_deref() == Some("user")
        && !content.parts.is_empty()
        && content
            .parts
            .iter()
            .all(|part| part.function_response.is_some())
}

#[async_trait]
impl<P> AgentAdapter for GeminiAdapter<P>
where
    P: LLMProvider<Request = GenerateContentRequest, Response = GenerateContentResponse>,
{
    type Message = Content;
    type Tool = FunctionDeclaration;
    type Part = Part;
    type Response = GenerateContentResponse;

    fn provider(&self) -> &'static str {
        "gemini"
    }

    async fn prepare_tools(&self, sessions: &[Arc<ToolSession>]) -> Result<Vec<FunctionDeclaration>> {
        let tools = collect_tools(sessions).await?;

        Ok(tools
            .iter()
            .map(|tool| FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description().to_string(),
                parameters: function_parameters(&tool.input_schema),
            })
            .collect())
    }

    fn user_message(&self, query: &str) -> Content {
        Content::user(vec![Part::text(query)])
    }

    async fn generate(
        &self,
        conversation: &[Content],
        tools: &[FunctionDeclaration],
    ) -> Result<Generation<GenerateContentResponse, Part>> {
        let request = GenerateContentRequest {
            model: self.model.clone(),
            contents: conversation.to_vec(),
            tools: if tools.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations: tools.to_vec(),
                }]
            },
            system_instruction: self
                .settings
                .system_prompt
                .as_ref()
                .map(|prompt| Content {
                    role: None,
                    parts: vec![Part::text(prompt.clone())],
                }),
            generation_config: Some(GenerationConfig {
                max_output_tokens: Some(self.settings.max_tokens),
                temperature: self.settings.temperature,
            }),
        };

        let provider = Arc::clone(&self.provider);
        let response = offload(async move { provider.send(request).await }).await?;

        let candidate = response.candidates.first().ok_or_else(|| {
            LLMError::UnexpectedResponse("Gemini response has no candidates".to_string())
        })?;

        let mut parts = candidate
            .content
            .as_ref()
            .map(|content| content.parts.clone())
            .unwrap_or_default();

        // results are matched to calls by id
        for call in parts.iter_mut().filter_map(|part| part.function_call.as_mut()) {
            if call.id.is_none() {
                call.id = Some(format!("call_{}", Uuid::new_v4().simple()));
            }
        }

        let has_tool_call = parts.iter().any(|part| part.function_call.is_some());
        debug!(
            parts = parts.len(),
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("none"),
            has_tool_call,
            "Gemini generation finished"
        );

        Ok(Generation {
            raw: response,
            has_tool_call,
            parts,
        })
    }

    fn assistant_message(&self, parts: Vec<Part>) -> Content {
        Content::model(parts)
    }

    /// One unusable call voids the turn, since each call needs a response
    fn extract_tool_calls(&self, parts: &[Part]) -> Vec<ToolCall> {
        parts
            .iter()
            .filter_map(|part| part.function_call.as_ref())
            .map(|call| {
                call_arguments(&call.name, &call.args).map(|args| ToolCall {
                    id: call.id.clone().unwrap_or_default(),
                    name: call.name.clone(),
                    args,
                })
            })
            .collect::<Option<Vec<_>>>()
            .unwrap_or_default()
    }

    fn integrate_tool_result(
        &self,
        conversation: &mut Vec<Content>,
        call: &ToolCall,
        result: &ToolResult,
    ) {
        let part = Part::function_response(FunctionResponse {
            id: Some(call.id.clone()),
            name: call.name.clone(),
            response: response_payload(result),
        });

        if conversation.last().is_some_and(is_function_response_turn) {
            if let Some(turn) = conversation.last_mut() {
                turn.parts.push(part);
                return;
            }
        }

        conversation.push(Content::user(vec![part]));
    }

    fn part_text<'a>(&self, part: &'a Part) -> Option<&'a str> {
        part.text.as_deref()
    }
}
