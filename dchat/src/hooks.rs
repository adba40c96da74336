//! Lifecycle hooks around one user turn of the orchestration loop.
//!
//! ```rust
//! use dchat::{ChatLoopHooks, NoopChatLoopHooks};
//!
//! fn accepts_loop_hooks(_hooks: &dyn ChatLoopHooks) {}
//!
//! accepts_loop_hooks(&NoopChatLoopHooks);
//! ```

use std::time::Duration;

use dbackend::{BackendId, BackendReply, ToolCall, ToolResult};
use dcommon::SessionId;

use crate::ChatError;

pub trait ChatLoopHooks: Send + Sync {
    fn on_model_turn_start(&self, _session_id: &SessionId, _model_turn: u32, _backend: BackendId) {
    }

    fn on_model_turn_finish(
        &self,
        _session_id: &SessionId,
        _model_turn: u32,
        _reply: &BackendReply,
        _elapsed: Duration,
    ) {
    }

    fn on_tool_dispatch(
        &self,
        _session_id: &SessionId,
        _model_turn: u32,
        _call: &ToolCall,
        _result: &ToolResult,
    ) {
    }

    fn on_turn_complete(
        &self,
        _session_id: &SessionId,
        _model_turns: u32,
        _answer: &str,
        _elapsed: Duration,
    ) {
    }

    fn on_turn_failed(
        &self,
        _session_id: &SessionId,
        _model_turns: u32,
        _error: &ChatError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopChatLoopHooks;

impl ChatLoopHooks for NoopChatLoopHooks {}
