use std::sync::{Arc, Mutex};
use std::time::Duration;

use dbackend::{
    BackendError, BackendId, BackendOperationHooks, BackendReply, BackendResponse, TokenUsage,
    ToolCall, ToolPayload, ToolResult,
};
use dchat::{ChatError, ChatLoopHooks};
use dcommon::SessionId;
use dtooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks};
use serde_json::{Map, json};

use crate::{
    MetricsObservabilityHooks, SafeBackendHooks, SafeChatHooks, SafeToolHooks,
    TracingObservabilityHooks,
};

fn sample_tool_call() -> ToolCall {
    ToolCall::new("call_2_0", "get_website_stats", Map::new())
}

fn sample_tool_context() -> ToolExecutionContext {
    ToolExecutionContext::new("session-1").with_trace_id("trace-1")
}

fn sample_reply() -> BackendReply {
    BackendReply {
        backend: BackendId::CloudflareWorkersAi,
        model: "@cf/meta/llama-3.1-8b-instruct".to_string(),
        response: BackendResponse::tool_calls(vec![sample_tool_call()]),
        usage: TokenUsage {
            input_tokens: 120,
            output_tokens: 12,
            total_tokens: 132,
        },
    }
}

fn exercise_backend_hooks(hooks: &dyn BackendOperationHooks) {
    let error = BackendError::rate_limited("429");
    hooks.on_attempt_start(BackendId::CloudflareWorkersAi, "invoke", 1);
    hooks.on_retry_scheduled(
        BackendId::CloudflareWorkersAi,
        "invoke",
        1,
        Duration::from_millis(500),
        &error,
    );
    hooks.on_success(BackendId::CloudflareWorkersAi, "invoke", 2);
    hooks.on_failure(BackendId::CloudflareWorkersAi, "invoke", 3, &error);
    hooks.on_fallback(BackendId::CloudflareWorkersAi, BackendId::Ollama, &error);
}

fn exercise_tool_hooks(hooks: &dyn ToolRuntimeHooks) {
    hooks.on_dispatch_start(&sample_tool_call(), &sample_tool_context());
    hooks.on_dispatch_success(
        &sample_tool_call(),
        &sample_tool_context(),
        &ToolPayload::Structured(json!({"pageviews": 120})),
        Duration::from_millis(20),
    );
    hooks.on_dispatch_failure(
        &sample_tool_call(),
        &sample_tool_context(),
        &ToolError::timeout("no result within 60s"),
        Duration::from_millis(20),
    );
}

fn exercise_chat_hooks(hooks: &dyn ChatLoopHooks) {
    let session = SessionId::from("session-1");
    hooks.on_model_turn_start(&session, 1, BackendId::CloudflareWorkersAi);
    hooks.on_model_turn_finish(&session, 1, &sample_reply(), Duration::from_millis(40));
    hooks.on_tool_dispatch(
        &session,
        1,
        &sample_tool_call(),
        &ToolResult::failure("call_2_0", "website not found"),
    );
    hooks.on_turn_complete(&session, 2, "Traffic is steady.", Duration::from_millis(90));
    hooks.on_turn_failed(
        &session,
        3,
        &ChatError::max_turns_exceeded(3, None),
        Duration::from_millis(90),
    );
}

#[test]
fn tracing_hooks_smoke_test_all_callbacks() {
    let hooks = TracingObservabilityHooks;
    exercise_backend_hooks(&hooks);
    exercise_tool_hooks(&hooks);
    exercise_chat_hooks(&hooks);
}

#[test]
fn metrics_hooks_smoke_test_all_callbacks() {
    let hooks = MetricsObservabilityHooks;
    exercise_backend_hooks(&hooks);
    exercise_tool_hooks(&hooks);
    exercise_chat_hooks(&hooks);
}

#[derive(Default, Clone)]
struct RecordingHooks {
    events: Arc<Mutex<Vec<&'static str>>>,
}

impl RecordingHooks {
    fn push(&self, event: &'static str) {
        self.events.lock().expect("events lock").push(event);
    }
}

impl BackendOperationHooks for RecordingHooks {
    fn on_attempt_start(&self, _backend: BackendId, _operation: &str, _attempt: u32) {
        self.push("attempt_start");
    }

    fn on_fallback(&self, _from: BackendId, _to: BackendId, _error: &BackendError) {
        self.push("fallback");
    }
}

impl ToolRuntimeHooks for RecordingHooks {
    fn on_dispatch_start(&self, _call: &ToolCall, _context: &ToolExecutionContext) {
        self.push("dispatch_start");
    }
}

impl ChatLoopHooks for RecordingHooks {
    fn on_turn_complete(
        &self,
        _session_id: &SessionId,
        _model_turns: u32,
        _answer: &str,
        _elapsed: Duration,
    ) {
        self.push("turn_complete");
    }
}

#[test]
fn safe_hooks_delegate_when_inner_succeeds() {
    let inner = RecordingHooks::default();
    let events = Arc::clone(&inner.events);

    exercise_backend_hooks(&SafeBackendHooks::new(inner.clone()));
    exercise_tool_hooks(&SafeToolHooks::new(inner.clone()));
    exercise_chat_hooks(&SafeChatHooks::new(inner));

    assert_eq!(
        *events.lock().expect("events lock"),
        vec!["attempt_start", "fallback", "dispatch_start", "turn_complete"]
    );
}

struct PanicHooks;

impl BackendOperationHooks for PanicHooks {
    fn on_attempt_start(&self, _backend: BackendId, _operation: &str, _attempt: u32) {
        panic!("attempt_start panic");
    }

    fn on_fallback(&self, _from: BackendId, _to: BackendId, _error: &BackendError) {
        panic!("fallback panic");
    }
}

impl ToolRuntimeHooks for PanicHooks {
    fn on_dispatch_failure(
        &self,
        _call: &ToolCall,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
        panic!("dispatch_failure panic");
    }
}

impl ChatLoopHooks for PanicHooks {
    fn on_model_turn_start(&self, _session_id: &SessionId, _model_turn: u32, _backend: BackendId) {
        panic!("model_turn_start panic");
    }

    fn on_turn_failed(
        &self,
        _session_id: &SessionId,
        _model_turns: u32,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
        panic!("turn_failed panic");
    }
}

#[test]
fn safe_hooks_swallow_panics() {
    exercise_backend_hooks(&SafeBackendHooks::new(PanicHooks));
    exercise_tool_hooks(&SafeToolHooks::new(PanicHooks));
    exercise_chat_hooks(&SafeChatHooks::new(PanicHooks));
}
