#![cfg(feature = "backend-ollama")]

use std::sync::{Arc, Mutex};

use dbackend::adapters::ollama::OllamaBackend;
use dbackend::adapters::openai::{
    OpenAiAssistantMessage, OpenAiAuth, OpenAiFinishReason, OpenAiRequest, OpenAiResponse,
    OpenAiRole, OpenAiToolCall, OpenAiTransport, OpenAiUsage,
};
use dbackend::{
    Backend, BackendError, BackendErrorKind, BackendFuture, BackendId, BackendRequest,
    BackendResponse, Conversation, ToolDescriptor,
};
use dcommon::GenerationOptions;
use serde_json::json;

#[derive(Debug, Default)]
struct FakeTransport {
    captured_auth: Mutex<Option<String>>,
    captured_request: Mutex<Option<OpenAiRequest>>,
    fail_with: Option<BackendError>,
}

impl OpenAiTransport for FakeTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> BackendFuture<'a, Result<OpenAiResponse, BackendError>> {
        Box::pin(async move {
            *self.captured_request.lock().expect("request lock") = Some(request);
            *self.captured_auth.lock().expect("auth lock") = Some(format!("{auth:?}"));

            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }

            Ok(OpenAiResponse {
                model: "llama3.2".to_string(),
                message: OpenAiAssistantMessage {
                    content: "checking the numbers".to_string(),
                    tool_calls: vec![OpenAiToolCall {
                        id: "call_1".to_string(),
                        name: "get_website_stats".to_string(),
                        arguments: r#"{"website_id":"abc"}"#.to_string(),
                    }],
                },
                finish_reason: OpenAiFinishReason::ToolCalls,
                usage: OpenAiUsage {
                    prompt_tokens: 2,
                    completion_tokens: 3,
                    total_tokens: 5,
                },
            })
        })
    }
}

fn conversation() -> Conversation {
    let mut conversation = Conversation::new("analytics consultant");
    conversation.push_user("how is example.com doing?");
    conversation
}

#[tokio::test]
async fn ollama_uses_placeholder_auth_and_fallback_model() {
    let transport = Arc::new(FakeTransport::default());
    let backend = OllamaBackend::new(transport.clone());
    let conversation = conversation();
    let tools = vec![
        ToolDescriptor::from_json_schema(
            "get_website_stats",
            "Summary stats",
            json!({"type": "object", "properties": {"website_id": {"type": "string"}}}),
        )
        .expect("schema"),
    ];

    let reply = backend
        .invoke(BackendRequest {
            model: " ",
            options: GenerationOptions::default(),
            conversation: &conversation,
            tools: &tools,
        })
        .await
        .expect("invoke should succeed");

    assert_eq!(reply.backend, BackendId::Ollama);
    assert_eq!(reply.usage.total_tokens, 5);
    let BackendResponse::ToolCalls { calls, commentary } = reply.response else {
        panic!("expected tool calls");
    };
    assert_eq!(calls[0].arguments.get("website_id"), Some(&json!("abc")));
    assert_eq!(commentary.as_deref(), Some("checking the numbers"));

    let captured = transport
        .captured_request
        .lock()
        .expect("request lock")
        .clone()
        .expect("request should be captured");
    assert_eq!(captured.model, "llama3.2");
    assert_eq!(captured.messages[0].role, OpenAiRole::System);
    assert_eq!(captured.tools[0].name, "get_website_stats");

    let auth = transport.captured_auth.lock().expect("auth lock").clone();
    assert_eq!(auth.as_deref(), Some("OpenAiAuth::Placeholder(ollama-local)"));
}

#[tokio::test]
async fn connection_failures_mention_the_local_server() {
    let transport = Arc::new(FakeTransport {
        fail_with: Some(BackendError::unavailable("could not connect to ollama")),
        ..FakeTransport::default()
    });
    let backend = OllamaBackend::new(transport);
    let conversation = conversation();

    let error = backend
        .invoke(BackendRequest {
            model: "llama3.2",
            options: GenerationOptions::default(),
            conversation: &conversation,
            tools: &[],
        })
        .await
        .expect_err("transport failure surfaces");

    assert_eq!(error.kind, BackendErrorKind::Unavailable);
    assert!(error.message.contains("is ollama running?"));
}

#[tokio::test]
async fn invalid_options_never_reach_the_transport() {
    let transport = Arc::new(FakeTransport::default());
    let backend = OllamaBackend::new(transport.clone());
    let conversation = conversation();

    let error = backend
        .invoke(BackendRequest {
            model: "llama3.2",
            options: GenerationOptions::default().with_max_tokens(0),
            conversation: &conversation,
            tools: &[],
        })
        .await
        .expect_err("zero max tokens is invalid");

    assert_eq!(error.kind, BackendErrorKind::Protocol);
    assert!(transport.captured_request.lock().expect("request lock").is_none());
}
