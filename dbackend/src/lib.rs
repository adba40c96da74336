//! Model backends, conversation state and the fallback selector.
//!
//! ```rust
//! use dbackend::{Conversation, ToolCall, ToolPayload, ToolResult};
//! use serde_json::Map;
//!
//! let mut conversation = Conversation::new("You are an analytics consultant.");
//! conversation.push_user("How did example.com do last week?");
//!
//! let call = ToolCall::new("call_1", "get_website_stats", Map::new());
//! let result = ToolResult::success("call_1", ToolPayload::Text("42 visitors".to_string()));
//! conversation.record_tool_exchange(call, result).expect("ids match");
//!
//! assert_eq!(conversation.len(), 4);
//! assert!(conversation.validate().is_ok());
//! ```

mod backend;
mod conversation;
mod credentials;
mod error;
mod model;
mod resilience;
mod selector;

pub mod adapters;

pub mod prelude {
    pub use crate::{
        Backend, BackendError, BackendErrorKind, BackendHandle, BackendId, BackendProfile,
        BackendReply, BackendResponse, BackendSelector, Conversation, FallbackScope, RetryPolicy,
        ToolCall, ToolDescriptor, ToolPayload, ToolResult, Turn,
    };
}

pub use backend::{Backend, BackendFuture, BackendHandle, BackendProfile, BackendRequest};
pub use conversation::{Conversation, ConversationError, ConversationErrorKind, Turn};
pub use credentials::{CredentialStore, SecretString};
pub use error::{BackendError, BackendErrorKind};
pub use model::{
    ArgumentKind, ArgumentSpec, BackendId, BackendReply, BackendResponse, TokenUsage, ToolCall,
    ToolDescriptor, ToolOutcome, ToolPayload, ToolResult, ToolSchema,
};
pub use resilience::{
    BackendOperationHooks, NoopOperationHooks, RetryPolicy, execute_with_retry,
};
pub use selector::{
    BackendFailure, BackendSelector, BackendsExhausted, FallbackScope, SelectorDecision,
};
