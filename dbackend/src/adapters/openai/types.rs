//! Chat-completions request/response types and conversation conversion.

use std::fmt::Formatter;

use dcommon::GenerationOptions;

use crate::{
    BackendError, BackendId, BackendReply, BackendResponse, Conversation, SecretString,
    TokenUsage, ToolCall, ToolDescriptor, ToolResult, Turn,
};

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    pub tools: Vec<OpenAiTool>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiRequest {
    /// Flattens the conversation into chat-completions messages.
    pub fn from_conversation(
        model: impl Into<String>,
        options: GenerationOptions,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Self {
        let messages = conversation
            .turns()
            .iter()
            .filter_map(OpenAiMessage::from_turn)
            .collect();

        Self {
            model: model.into(),
            messages,
            tools: tools.iter().map(OpenAiTool::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiMessage {
    pub role: OpenAiRole,
    pub content: Option<String>,
    pub tool_call_id: Option<String>,
    pub tool_calls: Vec<OpenAiToolCall>,
}

impl OpenAiMessage {
    pub fn text(role: OpenAiRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub(crate) fn tool_call(call: &ToolCall) -> Self {
        Self {
            role: OpenAiRole::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: vec![OpenAiToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: call.arguments_json(),
            }],
        }
    }

    pub(crate) fn tool_result(result: &ToolResult) -> Self {
        Self {
            role: OpenAiRole::Tool,
            content: Some(result.outcome.render_for_model()),
            tool_call_id: Some(result.call_id.clone()),
            tool_calls: Vec::new(),
        }
    }

    fn from_turn(turn: &Turn) -> Option<Self> {
        match turn {
            Turn::Context(text) if text.trim().is_empty() => None,
            Turn::Context(text) => Some(Self::text(OpenAiRole::System, text.as_str())),
            Turn::User(text) => Some(Self::text(OpenAiRole::User, text.as_str())),
            Turn::Assistant(text) => Some(Self::text(OpenAiRole::Assistant, text.as_str())),
            Turn::ToolCall(call) => Some(Self::tool_call(call)),
            Turn::ToolResult(result) => Some(Self::tool_result(result)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiRole {
    System,
    User,
    Assistant,
    Tool,
}

impl OpenAiRole {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiTool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolDescriptor> for OpenAiTool {
    fn from(value: &ToolDescriptor) -> Self {
        Self {
            name: value.name.clone(),
            description: value.description.clone(),
            parameters: value.schema.raw.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiResponse {
    pub model: String,
    pub message: OpenAiAssistantMessage,
    pub finish_reason: OpenAiFinishReason,
    pub usage: OpenAiUsage,
}

impl OpenAiResponse {
    /// Converts into the shared reply shape.
    ///
    /// Calls without an id get `call_{id_seed}_{index}` so results can still be paired.
    pub(crate) fn into_reply(
        self,
        backend: BackendId,
        id_seed: usize,
    ) -> Result<BackendReply, BackendError> {
        let calls = self
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                let id = if call.id.trim().is_empty() {
                    format!("call_{id_seed}_{index}")
                } else {
                    call.id
                };
                let arguments = ToolCall::parse_arguments(&call.arguments)?;
                Ok(ToolCall::new(id, call.name, arguments))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        let text = Some(self.message.content);
        let response = BackendResponse::from_parts(text, calls)?;

        Ok(BackendReply {
            backend,
            model: self.model,
            response,
            usage: self.usage.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiAssistantMessage {
    pub content: String,
    pub tool_calls: Vec<OpenAiToolCall>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAiFinishReason {
    Stop,
    Length,
    ToolCalls,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenAiUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(value: OpenAiUsage) -> Self {
        Self {
            input_tokens: value.prompt_tokens,
            output_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum OpenAiAuth {
    ApiKey(SecretString),
    /// Local servers such as Ollama accept any bearer value.
    Placeholder(&'static str),
}

impl OpenAiAuth {
    pub(crate) fn bearer(&self) -> &str {
        match self {
            Self::ApiKey(key) => key.expose(),
            Self::Placeholder(value) => value,
        }
    }
}

impl std::fmt::Debug for OpenAiAuth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("OpenAiAuth::ApiKey([REDACTED])"),
            Self::Placeholder(value) => write!(f, "OpenAiAuth::Placeholder({value})"),
        }
    }
}
