//! JSON-RPC 2.0 envelopes and the MCP payloads the analytics server speaks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dbackend::{ToolDescriptor, ToolPayload};

use crate::ToolError;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

#[derive(Debug, Clone, Serialize)]
pub(crate) struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn into_result(self) -> Result<Value, ToolError> {
        match self.error {
            Some(error) => Err(ToolError::execution(format!(
                "JSON-RPC error {}: {}",
                error.code, error.message
            ))),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeParams<'a> {
    pub protocol_version: &'static str,
    pub capabilities: Value,
    pub client_info: ClientInfo<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClientInfo<'a> {
    pub name: &'a str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct McpToolDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

impl McpToolDefinition {
    pub fn into_descriptor(self) -> Result<ToolDescriptor, ToolError> {
        if self.name.trim().is_empty() {
            return Err(ToolError::schema("tool definition has a blank name"));
        }

        ToolDescriptor::from_json_schema(&self.name, self.description, self.input_schema).map_err(
            |message| ToolError::schema(message).with_tool_name(self.name.clone()),
        )
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<McpToolDefinition>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CallToolParams<'a> {
    pub name: &'a str,
    pub arguments: &'a serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentPart>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// One text part that parses as JSON becomes structured; anything else is joined text.
    pub fn into_payload(self) -> Result<ToolPayload, ToolError> {
        let texts = self
            .content
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>();

        if self.is_error {
            let message = if texts.is_empty() {
                "tool reported an error without detail".to_string()
            } else {
                texts.join("\n")
            };
            return Err(ToolError::execution(message));
        }

        if let [single] = texts.as_slice()
            && let Ok(value) = serde_json::from_str::<Value>(single)
        {
            return Ok(ToolPayload::Structured(value));
        }

        Ok(ToolPayload::Text(texts.join("\n")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ContentPart {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpPrompt {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<McpPromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpPromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListPromptsResult {
    #[serde(default)]
    pub prompts: Vec<McpPrompt>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetPromptResult {
    #[serde(default)]
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PromptMessage {
    #[serde(default)]
    pub role: String,
    pub content: ContentPart,
}

impl GetPromptResult {
    /// Text of the user-facing messages, joined by blank lines.
    pub fn into_text(self) -> Option<String> {
        let texts = self
            .messages
            .into_iter()
            .filter(|message| message.role.is_empty() || message.role == "user")
            .filter(|message| message.content.kind.is_empty() || message.content.kind == "text")
            .filter_map(|message| message.content.text)
            .filter(|text| !text.trim().is_empty())
            .collect::<Vec<_>>();

        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n\n"))
        }
    }
}
