//! Workers AI `ai/run` request body and response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use dcommon::GenerationOptions;

use crate::{
    BackendError, BackendId, BackendReply, BackendResponse, Conversation, TokenUsage, ToolCall,
    ToolDescriptor, Turn,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudflareRequest {
    pub messages: Vec<CloudflareMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<CloudflareTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CloudflareRequest {
    pub fn from_conversation(
        options: GenerationOptions,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Self {
        let messages = conversation
            .turns()
            .iter()
            .filter_map(CloudflareMessage::from_turn)
            .collect();

        Self {
            messages,
            tools: tools.iter().map(CloudflareTool::from).collect(),
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        }
    }
}

/// One chat message. Tool calls are replayed as assistant JSON text and
/// results as `tool` messages carrying the call id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloudflareMessage {
    pub role: &'static str,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl CloudflareMessage {
    fn new(role: &'static str, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
        }
    }

    fn from_turn(turn: &Turn) -> Option<Self> {
        match turn {
            Turn::Context(text) if text.trim().is_empty() => None,
            Turn::Context(text) => Some(Self::new("system", text.as_str())),
            Turn::User(text) => Some(Self::new("user", text.as_str())),
            Turn::Assistant(text) => Some(Self::new("assistant", text.as_str())),
            Turn::ToolCall(call) => {
                let content = serde_json::json!({
                    "name": call.name,
                    "arguments": Value::Object(call.arguments.clone()),
                });
                Some(Self::new("assistant", content.to_string()))
            }
            Turn::ToolResult(result) => Some(Self {
                role: "tool",
                content: result.outcome.render_for_model(),
                tool_call_id: Some(result.call_id.clone()),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudflareTool {
    pub r#type: &'static str,
    pub function: CloudflareFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CloudflareFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl From<&ToolDescriptor> for CloudflareTool {
    fn from(value: &ToolDescriptor) -> Self {
        Self {
            r#type: "function",
            function: CloudflareFunction {
                name: value.name.clone(),
                description: value.description.clone(),
                parameters: value.schema.raw.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudflareResponse {
    pub text: Option<String>,
    pub tool_calls: Vec<CloudflareToolCall>,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CloudflareToolCall {
    pub name: String,
    pub arguments: Value,
}

impl CloudflareResponse {
    /// Workers AI does not assign call ids; they become `call_{id_seed}_{index}`.
    pub(crate) fn into_reply(
        self,
        model: &str,
        id_seed: usize,
    ) -> Result<BackendReply, BackendError> {
        let calls = self
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| {
                let arguments = ToolCall::arguments_from_value(call.arguments)?;
                Ok(ToolCall::new(
                    format!("call_{id_seed}_{index}"),
                    call.name,
                    arguments,
                ))
            })
            .collect::<Result<Vec<_>, BackendError>>()?;

        Ok(BackendReply {
            backend: BackendId::CloudflareWorkersAi,
            model: model.to_string(),
            response: BackendResponse::from_parts(self.text, calls)?,
            usage: self.usage,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CloudflareEnvelope {
    #[serde(default)]
    success: bool,
    result: Option<CloudflareApiResult>,
    #[serde(default)]
    errors: Vec<CloudflareApiError>,
}

#[derive(Debug, Deserialize)]
struct CloudflareApiResult {
    #[serde(default)]
    response: Value,
    tool_calls: Option<Vec<CloudflareApiToolCall>>,
    usage: Option<CloudflareApiUsage>,
}

#[derive(Debug, Deserialize)]
struct CloudflareApiToolCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct CloudflareApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CloudflareApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

/// Parses a successful-status body. `success: false` is a protocol error.
pub(crate) fn parse_envelope(body: &str) -> Result<CloudflareResponse, BackendError> {
    let envelope = serde_json::from_str::<CloudflareEnvelope>(body).map_err(|err| {
        BackendError::protocol(format!("cloudflare reply could not be parsed: {err}"))
    })?;

    if !envelope.success {
        return Err(BackendError::protocol(format!(
            "cloudflare reported failure: {}",
            join_errors(&envelope.errors).unwrap_or_else(|| "no error detail".to_string())
        )));
    }

    let result = envelope
        .result
        .ok_or_else(|| BackendError::protocol("cloudflare reply had no result"))?;

    let text = match result.response {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    };

    let usage = result
        .usage
        .map(|usage| TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
        .unwrap_or_default();

    Ok(CloudflareResponse {
        text,
        tool_calls: result
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| CloudflareToolCall {
                name: call.name,
                arguments: call.arguments,
            })
            .collect(),
        usage,
    })
}

/// Error text from a non-success body, when it is an envelope.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let envelope = serde_json::from_str::<CloudflareEnvelope>(body).ok()?;
    join_errors(&envelope.errors)
}

fn join_errors(errors: &[CloudflareApiError]) -> Option<String> {
    if errors.is_empty() {
        return None;
    }

    Some(
        errors
            .iter()
            .map(|error| match error.code {
                Some(code) => format!("{} ({code})", error.message),
                None => error.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, json};

    use super::*;
    use crate::{BackendErrorKind, ToolResult};

    #[test]
    fn request_replays_tool_exchanges_as_text() {
        let mut conversation = Conversation::new("consultant");
        conversation.push_user("stats please");
        let mut arguments = Map::new();
        arguments.insert("days".to_string(), json!(7));
        conversation
            .record_tool_exchange(
                ToolCall::new("call_2_0", "get_stats", arguments),
                ToolResult::failure("call_2_0", "upstream 500"),
            )
            .expect("matching ids");

        let request = CloudflareRequest::from_conversation(
            GenerationOptions::default().with_max_tokens(2048),
            &conversation,
            &[],
        );
        let body = serde_json::to_value(&request).expect("serializable");

        assert_eq!(
            body,
            json!({
                "messages": [
                    {"role": "system", "content": "consultant"},
                    {"role": "user", "content": "stats please"},
                    {"role": "assistant", "content": r#"{"arguments":{"days":7},"name":"get_stats"}"#},
                    {"role": "tool", "content": "tool call failed: upstream 500", "tool_call_id": "call_2_0"}
                ],
                "max_tokens": 2048
            })
        );
    }

    #[test]
    fn envelope_with_tool_calls_gets_deterministic_ids() {
        let response = parse_envelope(
            r#"{
                "success": true,
                "errors": [],
                "result": {
                    "response": null,
                    "tool_calls": [
                        {"name": "get_websites", "arguments": {}},
                        {"name": "get_stats", "arguments": {"website_id": "abc"}}
                    ],
                    "usage": {"prompt_tokens": 10, "completion_tokens": 4, "total_tokens": 14}
                }
            }"#,
        )
        .expect("envelope should parse");

        let reply = response
            .into_reply("@cf/meta/llama-3.1-8b-instruct", 2)
            .expect("reply should convert");
        assert_eq!(reply.usage.total_tokens, 14);
        let BackendResponse::ToolCalls { calls, .. } = reply.response else {
            panic!("expected tool calls");
        };
        let ids = calls.iter().map(|call| call.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["call_2_0", "call_2_1"]);
        assert_eq!(calls[1].arguments.get("website_id"), Some(&json!("abc")));
    }

    #[test]
    fn text_response_is_a_final_answer() {
        let reply = parse_envelope(r#"{"success": true, "result": {"response": "All good."}}"#)
            .expect("parse")
            .into_reply("m", 0)
            .expect("convert");
        assert_eq!(reply.response, BackendResponse::final_answer("All good."));
    }

    #[test]
    fn failure_envelopes_and_garbage_are_protocol_errors() {
        let failed = parse_envelope(
            r#"{"success": false, "errors": [{"code": 5007, "message": "No such model"}]}"#,
        )
        .expect_err("failure envelope");
        assert_eq!(failed.kind, BackendErrorKind::Protocol);
        assert!(failed.message.contains("No such model (5007)"));

        let garbage = parse_envelope("<html>").expect_err("not json");
        assert_eq!(garbage.kind, BackendErrorKind::Protocol);

        let empty = parse_envelope(r#"{"success": true, "result": {"response": "  "}}"#)
            .expect("parse")
            .into_reply("m", 0)
            .expect_err("blank reply");
        assert_eq!(empty.kind, BackendErrorKind::Protocol);
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let response = parse_envelope(
            r#"{"success": true, "result": {"tool_calls": [{"name": "x", "arguments": [1, 2]}]}}"#,
        )
        .expect("parse");
        let error = response.into_reply("m", 0).expect_err("array arguments");
        assert_eq!(error.kind, BackendErrorKind::Protocol);
    }
}
