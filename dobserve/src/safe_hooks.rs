use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use dbackend::{
    BackendError, BackendId, BackendOperationHooks, BackendReply, ToolCall, ToolPayload,
    ToolResult,
};
use dchat::{ChatError, ChatLoopHooks};
use dcommon::SessionId;
use dtooling::{ToolError, ToolExecutionContext, ToolRuntimeHooks};

pub struct SafeBackendHooks<H> {
    inner: H,
}

impl<H> SafeBackendHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> BackendOperationHooks for SafeBackendHooks<H>
where
    H: BackendOperationHooks,
{
    fn on_attempt_start(&self, backend: BackendId, operation: &str, attempt: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(backend, operation, attempt)
        }));
    }

    fn on_retry_scheduled(
        &self,
        backend: BackendId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &BackendError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_retry_scheduled(backend, operation, attempt, delay, error)
        }));
    }

    fn on_success(&self, backend: BackendId, operation: &str, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(backend, operation, attempts)
        }));
    }

    fn on_failure(&self, backend: BackendId, operation: &str, attempts: u32, error: &BackendError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(backend, operation, attempts, error)
        }));
    }

    fn on_fallback(&self, from: BackendId, to: BackendId, error: &BackendError) {
        let _ = catch_unwind(AssertUnwindSafe(|| self.inner.on_fallback(from, to, error)));
    }
}

pub struct SafeToolHooks<H> {
    inner: H,
}

impl<H> SafeToolHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ToolRuntimeHooks for SafeToolHooks<H>
where
    H: ToolRuntimeHooks,
{
    fn on_dispatch_start(&self, call: &ToolCall, context: &ToolExecutionContext) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_dispatch_start(call, context)
        }));
    }

    fn on_dispatch_success(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        payload: &ToolPayload,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_dispatch_success(call, context, payload, elapsed)
        }));
    }

    fn on_dispatch_failure(
        &self,
        call: &ToolCall,
        context: &ToolExecutionContext,
        error: &ToolError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_dispatch_failure(call, context, error, elapsed)
        }));
    }
}

pub struct SafeChatHooks<H> {
    inner: H,
}

impl<H> SafeChatHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ChatLoopHooks for SafeChatHooks<H>
where
    H: ChatLoopHooks,
{
    fn on_model_turn_start(&self, session_id: &SessionId, model_turn: u32, backend: BackendId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_model_turn_start(session_id, model_turn, backend)
        }));
    }

    fn on_model_turn_finish(
        &self,
        session_id: &SessionId,
        model_turn: u32,
        reply: &BackendReply,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_model_turn_finish(session_id, model_turn, reply, elapsed)
        }));
    }

    fn on_tool_dispatch(
        &self,
        session_id: &SessionId,
        model_turn: u32,
        call: &ToolCall,
        result: &ToolResult,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_tool_dispatch(session_id, model_turn, call, result)
        }));
    }

    fn on_turn_complete(
        &self,
        session_id: &SessionId,
        model_turns: u32,
        answer: &str,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_turn_complete(session_id, model_turns, answer, elapsed)
        }));
    }

    fn on_turn_failed(
        &self,
        session_id: &SessionId,
        model_turns: u32,
        error: &ChatError,
        elapsed: Duration,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_turn_failed(session_id, model_turns, error, elapsed)
        }));
    }
}
