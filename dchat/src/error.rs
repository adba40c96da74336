//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use dbackend::{BackendFailure, BackendsExhausted, ConversationError};
use dtooling::{ToolError, ToolErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    /// The tool server could not be reached during discovery.
    ToolProviderUnavailable,
    /// The tool server advertised a malformed or duplicated tool.
    ToolSchema,
    AllBackendsExhausted,
    MaxTurnsExceeded,
    /// An internal bookkeeping error; the conversation would have broken its pairing rules.
    Conversation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
    /// Assistant text produced before the turn was cut short.
    pub partial_answer: Option<String>,
    pub failures: Vec<BackendFailure>,
    /// Tool calls requested by the final model turn that were never dispatched.
    pub dropped_tool_calls: usize,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            partial_answer: None,
            failures: Vec::new(),
            dropped_tool_calls: 0,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn tool_provider_unavailable(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::ToolProviderUnavailable, message)
    }

    pub fn tool_schema(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::ToolSchema, message)
    }

    pub fn max_turns_exceeded(limit: u32, partial_answer: Option<String>) -> Self {
        Self {
            partial_answer,
            ..Self::new(
                ChatErrorKind::MaxTurnsExceeded,
                format!("no final answer after {limit} model turns"),
            )
        }
    }

    pub fn with_dropped_tool_calls(mut self, count: usize) -> Self {
        self.dropped_tool_calls = count;
        if count > 0 {
            self.message = format!("{}; {count} requested tool call(s) not run", self.message);
        }
        self
    }

    pub fn conversation(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Conversation, message)
    }

    /// Errors that prevent a session from starting at all.
    pub fn is_startup_fatal(&self) -> bool {
        matches!(
            self.kind,
            ChatErrorKind::ToolProviderUnavailable | ChatErrorKind::ToolSchema
        )
    }

    /// Errors after which the same session can take another user turn.
    pub fn is_session_recoverable(&self) -> bool {
        matches!(
            self.kind,
            ChatErrorKind::InvalidRequest
                | ChatErrorKind::AllBackendsExhausted
                | ChatErrorKind::MaxTurnsExceeded
        )
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<BackendsExhausted> for ChatError {
    fn from(value: BackendsExhausted) -> Self {
        Self {
            failures: value.failures.clone(),
            ..Self::new(ChatErrorKind::AllBackendsExhausted, value.to_string())
        }
    }
}

impl From<ConversationError> for ChatError {
    fn from(value: ConversationError) -> Self {
        ChatError::conversation(value.to_string())
    }
}

/// Discovery-time tool errors. Dispatch errors never get here; they are folded into results.
impl From<ToolError> for ChatError {
    fn from(value: ToolError) -> Self {
        match value.kind {
            ToolErrorKind::ProviderUnavailable | ToolErrorKind::Timeout => {
                ChatError::tool_provider_unavailable(value.to_string())
            }
            _ => ChatError::tool_schema(value.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use dbackend::{BackendError, BackendId};

    use super::*;

    #[test]
    fn discovery_errors_are_startup_fatal() {
        let unavailable = ChatError::from(ToolError::provider_unavailable("spawn failed"));
        assert_eq!(unavailable.kind, ChatErrorKind::ToolProviderUnavailable);
        assert!(unavailable.is_startup_fatal());
        assert!(!unavailable.is_session_recoverable());

        let schema = ChatError::from(ToolError::schema("duplicate tool"));
        assert_eq!(schema.kind, ChatErrorKind::ToolSchema);
        assert!(schema.is_startup_fatal());
    }

    #[test]
    fn exhaustion_keeps_every_failure() {
        let exhausted = BackendsExhausted {
            failures: vec![
                BackendFailure {
                    backend: BackendId::CloudflareWorkersAi,
                    error: BackendError::unavailable("suspended"),
                },
                BackendFailure {
                    backend: BackendId::Ollama,
                    error: BackendError::unavailable("connection refused"),
                },
            ],
        };

        let error = ChatError::from(exhausted);
        assert_eq!(error.kind, ChatErrorKind::AllBackendsExhausted);
        assert_eq!(error.failures.len(), 2);
        assert!(error.message.contains("connection refused"));
        assert!(error.is_session_recoverable());
    }

    #[test]
    fn max_turns_carries_partial_answer() {
        let error = ChatError::max_turns_exceeded(3, Some("Fetching stats".to_string()));
        assert_eq!(error.partial_answer.as_deref(), Some("Fetching stats"));
        assert_eq!(error.to_string(), "MaxTurnsExceeded: no final answer after 3 model turns");
        assert_eq!(error.dropped_tool_calls, 0);

        let error = error.with_dropped_tool_calls(2);
        assert_eq!(error.dropped_tool_calls, 2);
        assert_eq!(
            error.to_string(),
            "MaxTurnsExceeded: no final answer after 3 model turns; 2 requested tool call(s) not run"
        );
    }
}
