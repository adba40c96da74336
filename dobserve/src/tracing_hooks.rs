//! Tracing-based observability hooks for backend, tool and chat loop phases.
//!
//! ```rust
//! use dchat::ChatLoopHooks;
//! use dobserve::TracingObservabilityHooks;
//!
//! fn accepts_loop_hooks(_hooks: &dyn ChatLoopHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_loop_hooks(&hooks);
//! ```

use std::time::Duration;

use dbackend::{
    BackendError, BackendId, BackendOperationHooks, BackendReply, BackendResponse, ToolCall,
    ToolPayload, ToolResult,
};
use dchat::{ChatError, ChatLoopHooks};
use dcommon::SessionId;
use dtooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl BackendOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, backend: BackendId, operation: &str, attempt: u32) {
        tracing::debug!(
            phase = "backend",
            event = "attempt_start",
            backend = %backend,
            operation,
            attempt
        );
    }

    fn on_retry_scheduled(
        &self,
        backend: BackendId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &BackendError,
    ) {
        tracing::warn!(
            phase = "backend",
            event = "retry_scheduled",
            backend = %backend,
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_success(&self, backend: BackendId, operation: &str, attempts: u32) {
        tracing::debug!(
            phase = "backend",
            event = "success",
            backend = %backend,
            operation,
            attempts
        );
    }

    fn on_failure(&self, backend: BackendId, operation: &str, attempts: u32, error: &BackendError) {
        tracing::error!(
            phase = "backend",
            event = "failure",
            backend = %backend,
            operation,
            attempts,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_fallback(&self, from: BackendId, to: BackendId, error: &BackendError) {
        tracing::warn!(
            phase = "backend",
            event = "fallback",
            from = %from,
            to = %to,
            error_kind = ?error.kind,
            error = %error
        );
    }
}

impl ToolRuntimeHooks for TracingObservabilityHooks {
    fn on_dispatch_start(&self, call: &ToolCall, context: &ToolExecutionContext) {
        tracing::info!(
            phase = "tool",
            event = "dispatch_start",
            tool_name = %call.name,
            tool_call_id = %call.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            model_turn = context.model_turn
        );
    }

    fn on_dispatch_success(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        payload: &ToolPayload,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "tool",
            event = "dispatch_success",
            tool_name = %call.name,
            tool_call_id = %call.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            structured = matches!(payload, ToolPayload::Structured(_)),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_dispatch_failure(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        tracing::warn!(
            phase = "tool",
            event = "dispatch_failure",
            tool_name = %call.name,
            tool_call_id = %call.id,
            session_id = %context.session_id,
            trace_id = context.trace_id.as_ref().map(|id| id.as_str()),
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            error = %error
        );
    }
}

impl ChatLoopHooks for TracingObservabilityHooks {
    fn on_model_turn_start(&self, session_id: &SessionId, model_turn: u32, backend: BackendId) {
        tracing::info!(
            phase = "chat",
            event = "model_turn_start",
            session_id = %session_id,
            model_turn,
            backend = %backend
        );
    }

    fn on_model_turn_finish(
        &self,
        session_id: &SessionId,
        model_turn: u32,
        reply: &BackendReply,
        elapsed: Duration,
    ) {
        let tool_calls = match &reply.response {
            BackendResponse::FinalAnswer(_) => 0,
            BackendResponse::ToolCalls { calls, .. } => calls.len(),
        };

        tracing::info!(
            phase = "chat",
            event = "model_turn_finish",
            session_id = %session_id,
            model_turn,
            backend = %reply.backend,
            model = %reply.model,
            tool_calls,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_tool_dispatch(
        &self,
        session_id: &SessionId,
        model_turn: u32,
        call: &ToolCall,
        result: &ToolResult,
    ) {
        tracing::debug!(
            phase = "chat",
            event = "tool_folded",
            session_id = %session_id,
            model_turn,
            tool_name = %call.name,
            tool_call_id = %call.id,
            success = result.is_success()
        );
    }

    fn on_turn_complete(
        &self,
        session_id: &SessionId,
        model_turns: u32,
        answer: &str,
        elapsed: Duration,
    ) {
        tracing::info!(
            phase = "chat",
            event = "turn_complete",
            session_id = %session_id,
            model_turns,
            answer_chars = answer.chars().count(),
            elapsed_ms = elapsed.as_millis() as u64
        );
    }

    fn on_turn_failed(
        &self,
        session_id: &SessionId,
        model_turns: u32,
        error: &ChatError,
        elapsed: Duration,
    ) {
        tracing::error!(
            phase = "chat",
            event = "turn_failed",
            session_id = %session_id,
            model_turns,
            elapsed_ms = elapsed.as_millis() as u64,
            error_kind = ?error.kind,
            dropped_tool_calls = error.dropped_tool_calls as u64,
            error = %error
        );
    }
}
