//! Append-only turn history owned by one chat session.
//!
//! Tool calls only enter the history together with their result, so a
//! conversation built through this API always satisfies [`Conversation::validate`].
//!
//! ```rust
//! use dbackend::{Conversation, ToolCall, ToolPayload, ToolResult};
//!
//! let mut conversation = Conversation::new("You are an analytics consultant.");
//! conversation.push_user("How many visitors last week?");
//!
//! let call = ToolCall::new("call_1", "get_website_stats", Default::default());
//! let result = ToolResult::success("call_1", ToolPayload::Text("visitors: 120".into()));
//! conversation.record_tool_exchange(call, result).expect("ids match");
//! conversation.push_assistant("120 visitors.");
//!
//! assert_eq!(conversation.len(), 5);
//! assert!(conversation.validate().is_ok());
//! assert_eq!(conversation.last_assistant_text(), Some("120 visitors."));
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::{ToolCall, ToolResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// System/context text; always the first turn, possibly empty.
    Context(String),
    User(String),
    Assistant(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl Turn {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Context(_) => "context",
            Self::User(_) => "user",
            Self::Assistant(_) => "assistant",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Context(text) | Self::User(text) | Self::Assistant(text) => Some(text),
            Self::ToolCall(_) | Self::ToolResult(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationErrorKind {
    MissingContext,
    MisplacedContext,
    MismatchedToolResult,
    UnmatchedToolCall,
    OrphanToolResult,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationError {
    pub kind: ConversationErrorKind,
    pub message: String,
    pub turn_index: Option<usize>,
}

impl ConversationError {
    fn new(kind: ConversationErrorKind, message: impl Into<String>, turn_index: Option<usize>) -> Self {
        Self {
            kind,
            message: message.into(),
            turn_index,
        }
    }
}

impl Display for ConversationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.turn_index {
            Some(index) => write!(f, "{:?} at turn {}: {}", self.kind, index, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

impl Error for ConversationError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    turns: Vec<Turn>,
    pending: bool,
}

impl Conversation {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::Context(context.into())],
            pending: false,
        }
    }

    pub fn context(&self) -> &str {
        match self.turns.first() {
            Some(Turn::Context(text)) => text,
            _ => "",
        }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::User(text.into()));
        self.pending = true;
    }

    /// Appends the final answer to the latest user turn.
    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Assistant(text.into()));
        self.pending = false;
    }

    /// Appends assistant text that accompanied tool calls. The user turn stays open.
    pub fn push_commentary(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Assistant(text.into()));
    }

    /// Appends a tool call and its result as one unit.
    pub fn record_tool_exchange(
        &mut self,
        call: ToolCall,
        result: ToolResult,
    ) -> Result<(), ConversationError> {
        if call.id != result.call_id {
            return Err(ConversationError::new(
                ConversationErrorKind::MismatchedToolResult,
                format!(
                    "result for '{}' cannot answer call '{}'",
                    result.call_id, call.id
                ),
                Some(self.turns.len()),
            ));
        }

        self.turns.push(Turn::ToolCall(call));
        self.turns.push(Turn::ToolResult(result));
        Ok(())
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn has_user_message(&self) -> bool {
        self.turns.iter().any(|turn| matches!(turn, Turn::User(_)))
    }

    pub fn last_assistant_text(&self) -> Option<&str> {
        self.turns.iter().rev().find_map(|turn| match turn {
            Turn::Assistant(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// True when the latest user turn has no final answer yet.
    pub fn pending_user_turn(&self) -> bool {
        self.pending
    }

    /// Assistant text produced since the latest user turn.
    pub fn assistant_text_since_user(&self) -> Option<&str> {
        for turn in self.turns.iter().rev() {
            match turn {
                Turn::User(_) => return None,
                Turn::Assistant(text) => return Some(text.as_str()),
                _ => {}
            }
        }

        None
    }

    pub fn validate(&self) -> Result<(), ConversationError> {
        if !matches!(self.turns.first(), Some(Turn::Context(_))) {
            return Err(ConversationError::new(
                ConversationErrorKind::MissingContext,
                "conversation must start with a context turn",
                Some(0),
            ));
        }

        let mut open_calls: Vec<&str> = Vec::new();
        for (index, turn) in self.turns.iter().enumerate().skip(1) {
            match turn {
                Turn::Context(_) => {
                    return Err(ConversationError::new(
                        ConversationErrorKind::MisplacedContext,
                        "context turn may only appear first",
                        Some(index),
                    ));
                }
                Turn::User(_) => {
                    if let Some(call_id) = open_calls.first() {
                        return Err(ConversationError::new(
                            ConversationErrorKind::UnmatchedToolCall,
                            format!("tool call '{call_id}' has no result before the next user turn"),
                            Some(index),
                        ));
                    }
                }
                Turn::Assistant(_) => {}
                Turn::ToolCall(call) => open_calls.push(call.id.as_str()),
                Turn::ToolResult(result) => {
                    let position = open_calls
                        .iter()
                        .position(|call_id| *call_id == result.call_id)
                        .ok_or_else(|| {
                            ConversationError::new(
                                ConversationErrorKind::OrphanToolResult,
                                format!("tool result '{}' has no open call", result.call_id),
                                Some(index),
                            )
                        })?;
                    open_calls.remove(position);
                }
            }
        }

        match open_calls.first() {
            Some(call_id) => Err(ConversationError::new(
                ConversationErrorKind::UnmatchedToolCall,
                format!("tool call '{call_id}' has no result"),
                None,
            )),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub fn from_turns_unchecked(turns: Vec<Turn>) -> Self {
        let pending = matches!(
            turns
                .iter()
                .rev()
                .find(|turn| matches!(turn, Turn::User(_) | Turn::Assistant(_))),
            Some(Turn::User(_))
        );
        Self { turns, pending }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::ToolPayload;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "get_websites", Map::new())
    }

    fn ok(id: &str) -> ToolResult {
        ToolResult::success(id, ToolPayload::Text("[]".to_string()))
    }

    #[test]
    fn fresh_conversation_holds_only_context() {
        let conversation = Conversation::new("");
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.context(), "");
        assert!(!conversation.has_user_message());
        assert!(!conversation.pending_user_turn());
        assert!(conversation.validate().is_ok());
    }

    #[test]
    fn mismatched_exchange_is_rejected_without_appending() {
        let mut conversation = Conversation::new("ctx");
        conversation.push_user("hi");

        let error = conversation
            .record_tool_exchange(call("call_1"), ok("call_2"))
            .expect_err("ids differ");
        assert_eq!(error.kind, ConversationErrorKind::MismatchedToolResult);
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn pending_user_turn_tracks_answers() {
        let mut conversation = Conversation::new("ctx");
        conversation.push_user("question");
        assert!(conversation.pending_user_turn());

        conversation
            .record_tool_exchange(call("call_1"), ok("call_1"))
            .expect("exchange");
        assert!(conversation.pending_user_turn());
        assert_eq!(conversation.assistant_text_since_user(), None);

        conversation.push_assistant("answer");
        assert!(!conversation.pending_user_turn());
        assert_eq!(conversation.assistant_text_since_user(), Some("answer"));
    }

    #[test]
    fn commentary_leaves_the_user_turn_open() {
        let mut conversation = Conversation::new("ctx");
        conversation.push_user("question");
        conversation.push_commentary("Let me look up the stats.");

        assert!(conversation.pending_user_turn());
        assert_eq!(
            conversation.assistant_text_since_user(),
            Some("Let me look up the stats.")
        );
        assert_eq!(conversation.last_assistant_text(), Some("Let me look up the stats."));

        conversation.push_assistant("120 visitors.");
        assert!(!conversation.pending_user_turn());
    }

    #[test]
    fn validate_flags_structural_violations() {
        let missing_context = Conversation::from_turns_unchecked(vec![Turn::User("hi".into())]);
        assert_eq!(
            missing_context.validate().expect_err("no context").kind,
            ConversationErrorKind::MissingContext
        );

        let unmatched = Conversation::from_turns_unchecked(vec![
            Turn::Context(String::new()),
            Turn::User("hi".into()),
            Turn::ToolCall(call("call_1")),
            Turn::User("again".into()),
        ]);
        let error = unmatched.validate().expect_err("unmatched call");
        assert_eq!(error.kind, ConversationErrorKind::UnmatchedToolCall);
        assert_eq!(error.turn_index, Some(3));

        let orphan = Conversation::from_turns_unchecked(vec![
            Turn::Context(String::new()),
            Turn::User("hi".into()),
            Turn::ToolResult(ok("call_9")),
        ]);
        assert_eq!(
            orphan.validate().expect_err("orphan result").kind,
            ConversationErrorKind::OrphanToolResult
        );

        let trailing = Conversation::from_turns_unchecked(vec![
            Turn::Context(String::new()),
            Turn::ToolCall(call("call_1")),
        ]);
        assert_eq!(
            trailing.validate().expect_err("trailing call").kind,
            ConversationErrorKind::UnmatchedToolCall
        );

        let misplaced = Conversation::from_turns_unchecked(vec![
            Turn::Context(String::new()),
            Turn::Context(String::new()),
        ]);
        assert_eq!(
            misplaced.validate().expect_err("second context").kind,
            ConversationErrorKind::MisplacedContext
        );
    }

    #[test]
    fn interleaved_results_with_matching_ids_are_valid() {
        let conversation = Conversation::from_turns_unchecked(vec![
            Turn::Context(String::new()),
            Turn::User("hi".into()),
            Turn::ToolCall(call("a")),
            Turn::ToolCall(call("b")),
            Turn::ToolResult(ok("b")),
            Turn::ToolResult(ok("a")),
            Turn::Assistant("done".into()),
        ]);

        assert!(conversation.validate().is_ok());
    }
}
