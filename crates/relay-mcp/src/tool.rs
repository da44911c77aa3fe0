//! Tool definitions and tool results as exchanged with MCP servers

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A tool advertised by a server in `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

impl Tool {
    /// Create a tool with a description and schema
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }

    /// Description, or the empty string when the server sent none
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Result of `tools/call`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,

    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,

    #[serde(rename = "isError", default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// One item of a tool result's content payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ToolResult {
    /// Result holding a single text item
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            ..Self::default()
        }
    }

    /// Whether the server flagged the result as an error
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text items joined with newlines
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Collapse the content payload into one JSON value
    ///
    /// Structured objects win. Text-only payloads that hold a JSON object or
    /// array are parsed, other text stays a string. Mixed payloads keep
    /// their text and list image and resource metadata.
    pub fn normalized(&self) -> Value {
        if let Some(structured @ Value::Object(_)) = &self.structured_content {
            return structured.clone();
        }

        let text = self.joined_text();
        let text_only = self
            .content
            .iter()
            .all(|item| matches!(item, ToolContent::Text { .. }));

        if text_only {
            return match serde_json::from_str::<Value>(text.trim()) {
                Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
                _ => Value::String(text),
            };
        }

        let mut images = Vec::new();
        let mut resources = Vec::new();
        for item in &self.content {
            match item {
                ToolContent::Image { mime_type, .. } => {
                    images.push(json!({"mimeType": mime_type}));
                }
                ToolContent::Resource { uri, mime_type } => {
                    resources.push(json!({"uri": uri, "mimeType": mime_type}));
                }
                ToolContent::Text { .. } => {}
            }
        }

        json!({
            "text": text,
            "images": images,
            "resources": resources,
        })
    }
}
