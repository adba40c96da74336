//! Metrics-based observability hooks for backend, tool and chat loop phases.
//!
//! ```rust
//! use dbackend::BackendOperationHooks;
//! use dobserve::MetricsObservabilityHooks;
//!
//! fn accepts_backend_hooks(_hooks: &dyn BackendOperationHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_backend_hooks(&hooks);
//! ```

use std::time::Duration;

use dbackend::{
    BackendError, BackendId, BackendOperationHooks, BackendReply, ToolCall, ToolPayload,
    ToolResult,
};
use dchat::{ChatError, ChatLoopHooks};
use dcommon::SessionId;
use dtooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl BackendOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, backend: BackendId, operation: &str, _attempt: u32) {
        metrics::counter!(
            "dashmind_backend_attempt_start_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_retry_scheduled(
        &self,
        backend: BackendId,
        operation: &str,
        _attempt: u32,
        delay: Duration,
        error: &BackendError,
    ) {
        metrics::counter!(
            "dashmind_backend_retry_scheduled_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_backend_retry_delay_seconds",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(delay.as_secs_f64());
    }

    fn on_success(&self, backend: BackendId, operation: &str, attempts: u32) {
        metrics::counter!(
            "dashmind_backend_success_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_backend_attempts_per_success",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_failure(&self, backend: BackendId, operation: &str, attempts: u32, error: &BackendError) {
        metrics::counter!(
            "dashmind_backend_failure_total",
            "backend" => backend.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_backend_attempts_per_failure",
            "backend" => backend.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_fallback(&self, from: BackendId, to: BackendId, error: &BackendError) {
        metrics::counter!(
            "dashmind_backend_fallback_total",
            "from" => from.to_string(),
            "to" => to.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }
}

impl ToolRuntimeHooks for MetricsObservabilityHooks {
    fn on_dispatch_start(&self, call: &ToolCall, _context: &ToolExecutionContext) {
        metrics::counter!(
            "dashmind_tool_dispatch_start_total",
            "tool_name" => call.name.clone()
        )
        .increment(1);
    }

    fn on_dispatch_success(
        &self,
        call: &ToolCall,
        _context: &ToolExecutionContext,
        _payload: &ToolPayload,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "dashmind_tool_dispatch_success_total",
            "tool_name" => call.name.clone()
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_tool_dispatch_duration_seconds",
            "tool_name" => call.name.clone(),
            "status" => "success"
        )
        .record(elapsed.as_secs_f64());
    }

    fn on_dispatch_failure(
        &self,
        call: &ToolCall,
        _context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "dashmind_tool_dispatch_failure_total",
            "tool_name" => call.name.clone(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_tool_dispatch_duration_seconds",
            "tool_name" => call.name.clone(),
            "status" => "failure"
        )
        .record(elapsed.as_secs_f64());
    }
}

impl ChatLoopHooks for MetricsObservabilityHooks {
    fn on_model_turn_finish(
        &self,
        _session_id: &SessionId,
        _model_turn: u32,
        reply: &BackendReply,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "dashmind_chat_model_turn_total",
            "backend" => reply.backend.to_string(),
            "final" => reply.response.is_final().to_string()
        )
        .increment(1);
        metrics::histogram!(
            "dashmind_chat_model_turn_duration_seconds",
            "backend" => reply.backend.to_string()
        )
        .record(elapsed.as_secs_f64());
        metrics::counter!("dashmind_chat_tokens_total", "direction" => "input")
            .increment(u64::from(reply.usage.input_tokens));
        metrics::counter!("dashmind_chat_tokens_total", "direction" => "output")
            .increment(u64::from(reply.usage.output_tokens));
    }

    fn on_tool_dispatch(
        &self,
        _session_id: &SessionId,
        _model_turn: u32,
        _call: &ToolCall,
        result: &ToolResult,
    ) {
        metrics::counter!(
            "dashmind_chat_tool_result_total",
            "status" => if result.is_success() { "success" } else { "failure" }
        )
        .increment(1);
    }

    fn on_turn_complete(
        &self,
        _session_id: &SessionId,
        model_turns: u32,
        _answer: &str,
        elapsed: Duration,
    ) {
        metrics::counter!("dashmind_chat_turn_total", "status" => "answered").increment(1);
        metrics::histogram!("dashmind_chat_model_turns_per_answer").record(model_turns as f64);
        metrics::histogram!("dashmind_chat_turn_duration_seconds", "status" => "answered")
            .record(elapsed.as_secs_f64());
    }

    fn on_turn_failed(
        &self,
        _session_id: &SessionId,
        _model_turns: u32,
        error: &ChatError,
        elapsed: Duration,
    ) {
        metrics::counter!(
            "dashmind_chat_turn_total",
            "status" => "failed",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!("dashmind_chat_turn_duration_seconds", "status" => "failed")
            .record(elapsed.as_secs_f64());
    }
}
