#![cfg(feature = "backend-openai")]

use std::sync::{Arc, Mutex};

use dbackend::adapters::openai::{
    OpenAiAssistantMessage, OpenAiAuth, OpenAiBackend, OpenAiFinishReason, OpenAiRequest,
    OpenAiResponse, OpenAiRole, OpenAiTransport, OpenAiUsage,
};
use dbackend::{
    Backend, BackendError, BackendErrorKind, BackendFuture, BackendRequest, BackendResponse,
    Conversation, CredentialStore, ToolCall, ToolResult,
};
use dcommon::GenerationOptions;
use serde_json::Map;

#[derive(Debug, Default)]
struct FakeTransport {
    captured: Mutex<Vec<(OpenAiRequest, String)>>,
}

impl OpenAiTransport for FakeTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> BackendFuture<'a, Result<OpenAiResponse, BackendError>> {
        Box::pin(async move {
            let auth = match auth {
                OpenAiAuth::ApiKey(key) => key.expose().to_string(),
                OpenAiAuth::Placeholder(value) => value.to_string(),
            };
            self.captured
                .lock()
                .expect("captured lock")
                .push((request, auth));

            Ok(OpenAiResponse {
                model: "gpt-4o-mini".to_string(),
                message: OpenAiAssistantMessage {
                    content: "Traffic was steady.".to_string(),
                    tool_calls: Vec::new(),
                },
                finish_reason: OpenAiFinishReason::Stop,
                usage: OpenAiUsage::default(),
            })
        })
    }
}

#[tokio::test]
async fn missing_api_key_is_unavailable_without_touching_transport() {
    let transport = Arc::new(FakeTransport::default());
    let backend = OpenAiBackend::new(Arc::new(CredentialStore::new()), transport.clone());
    let mut conversation = Conversation::new("ctx");
    conversation.push_user("hi");

    let error = backend
        .invoke(BackendRequest {
            model: "gpt-4o-mini",
            options: GenerationOptions::default(),
            conversation: &conversation,
            tools: &[],
        })
        .await
        .expect_err("no key configured");

    assert_eq!(error.kind, BackendErrorKind::Unavailable);
    assert!(transport.captured.lock().expect("captured lock").is_empty());
}

#[tokio::test]
async fn failed_tool_results_are_sent_as_tool_messages() {
    let credentials = Arc::new(CredentialStore::new());
    credentials.set_openai_api_key("sk-test").expect("valid key");
    let transport = Arc::new(FakeTransport::default());
    let backend = OpenAiBackend::new(credentials, transport.clone());

    let mut conversation = Conversation::new("ctx");
    conversation.push_user("stats?");
    conversation
        .record_tool_exchange(
            ToolCall::new("call_9", "get_stats", Map::new()),
            ToolResult::failure("call_9", "website not found"),
        )
        .expect("ids match");

    let reply = backend
        .invoke(BackendRequest {
            model: "",
            options: GenerationOptions::default().with_temperature(0.2),
            conversation: &conversation,
            tools: &[],
        })
        .await
        .expect("invoke should succeed");
    assert_eq!(reply.response, BackendResponse::final_answer("Traffic was steady."));

    let captured = transport.captured.lock().expect("captured lock");
    let (request, auth) = &captured[0];
    assert_eq!(auth, "sk-test");
    assert_eq!(request.model, "gpt-4o-mini");
    let last = request.messages.last().expect("tool message");
    assert_eq!(last.role, OpenAiRole::Tool);
    assert_eq!(last.tool_call_id.as_deref(), Some("call_9"));
    assert_eq!(
        last.content.as_deref(),
        Some("tool call failed: website not found")
    );
}
