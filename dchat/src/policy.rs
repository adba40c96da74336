//! Loop limits and the explicit loop state.

use std::time::Duration;

use dtooling::DEFAULT_TOOL_TIMEOUT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatPolicy {
    /// Model invocations allowed per user turn.
    pub max_model_turns: u32,
    pub tool_timeout: Duration,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            max_model_turns: 8,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl ChatPolicy {
    pub fn with_max_model_turns(mut self, max_model_turns: u32) -> Self {
        self.max_model_turns = max_model_turns.max(1);
        self
    }

    pub fn with_tool_timeout(mut self, tool_timeout: Duration) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }
}

/// Where a session is in its current user turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    AwaitingUserInput,
    ModelTurn,
    ToolDispatch,
    /// The last user turn got a final answer.
    Answered,
    /// The model-turn limit was reached while tools were still being requested.
    Exhausted,
    /// Every backend failed; the user turn is still pending and may be retried.
    Failed,
}
