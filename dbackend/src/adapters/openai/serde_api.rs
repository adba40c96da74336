//! Chat-completions wire payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::BackendError;

use super::types::{
    OpenAiAssistantMessage, OpenAiFinishReason, OpenAiMessage, OpenAiRequest, OpenAiResponse,
    OpenAiTool, OpenAiToolCall, OpenAiUsage,
};

pub(crate) fn build_api_request(request: OpenAiRequest) -> Result<OpenAiApiRequest, BackendError> {
    if request.messages.is_empty() {
        return Err(BackendError::protocol(
            "chat completion request requires at least one message",
        ));
    }

    let messages = request
        .messages
        .into_iter()
        .map(OpenAiApiMessage::from)
        .collect::<Vec<_>>();

    let tools = if request.tools.is_empty() {
        None
    } else {
        Some(request.tools.into_iter().map(OpenAiApiTool::from).collect())
    };

    Ok(OpenAiApiRequest {
        model: request.model,
        messages,
        tools,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        stream: false,
    })
}

pub(crate) fn parse_finish_reason(value: Option<&str>) -> OpenAiFinishReason {
    match value {
        Some("stop") => OpenAiFinishReason::Stop,
        Some("length") => OpenAiFinishReason::Length,
        Some("tool_calls") => OpenAiFinishReason::ToolCalls,
        _ => OpenAiFinishReason::Other,
    }
}

pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiErrorEnvelope {
    pub error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiError {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiMessage {
    pub role: &'static str,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OpenAiApiRequestToolCall>,
}

impl From<OpenAiMessage> for OpenAiApiMessage {
    fn from(value: OpenAiMessage) -> Self {
        Self {
            role: value.role.as_str(),
            content: value.content,
            tool_call_id: value.tool_call_id,
            tool_calls: value
                .tool_calls
                .into_iter()
                .map(|call| OpenAiApiRequestToolCall {
                    id: call.id,
                    r#type: "function",
                    function: OpenAiApiCallFunction {
                        name: call.name,
                        arguments: call.arguments,
                    },
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiRequestToolCall {
    pub id: String,
    pub r#type: &'static str,
    pub function: OpenAiApiCallFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiCallFunction {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiTool {
    pub r#type: &'static str,
    pub function: OpenAiApiFunction,
}

impl From<OpenAiTool> for OpenAiApiTool {
    fn from(value: OpenAiTool) -> Self {
        Self {
            r#type: "function",
            function: OpenAiApiFunction {
                name: value.name,
                description: value.description,
                parameters: value.parameters,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct OpenAiApiFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiResponse {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub choices: Vec<OpenAiApiChoice>,
    pub usage: Option<OpenAiApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiAssistantMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<OpenAiApiToolCall>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiToolCall {
    #[serde(default)]
    pub id: String,
    pub function: OpenAiApiToolFunction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiToolFunction {
    pub name: String,
    /// A JSON string per the API, though some compatible servers send an object.
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenAiApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl TryFrom<OpenAiApiResponse> for OpenAiResponse {
    type Error = BackendError;

    fn try_from(value: OpenAiApiResponse) -> Result<Self, Self::Error> {
        let choice = value
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::protocol("chat completion did not include choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| OpenAiToolCall {
                id: call.id,
                name: call.function.name,
                arguments: match call.function.arguments {
                    Value::String(text) => text,
                    Value::Null => String::new(),
                    other => other.to_string(),
                },
            })
            .collect::<Vec<_>>();

        let usage = value
            .usage
            .map(|usage| OpenAiUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            })
            .unwrap_or_default();

        Ok(OpenAiResponse {
            model: value.model,
            message: OpenAiAssistantMessage {
                content: choice.message.content.unwrap_or_default(),
                tool_calls,
            },
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
            usage,
        })
    }
}
