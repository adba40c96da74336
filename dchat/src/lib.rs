//! Conversation ownership and the tool-calling orchestration loop.
//!
//! A [`ChatSession`] owns one [`dbackend::Conversation`], discovers its tool
//! catalog once at start, and alternates model turns with tool dispatch until
//! the active backend produces a final answer.

mod error;
mod hooks;
mod policy;
mod session;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, ChatLoopHooks, ChatPolicy, ChatSession, ChatSessionBuilder,
        LoopState,
    };
    pub use dbackend::{BackendSelector, Conversation, FallbackScope, RetryPolicy, Turn};
    pub use dcommon::{SessionId, TraceId};
    pub use dtooling::{ToolCatalog, ToolProvider, ToolRegistry};
}

pub use error::{ChatError, ChatErrorKind};
pub use hooks::{ChatLoopHooks, NoopChatLoopHooks};
pub use policy::{ChatPolicy, LoopState};
pub use session::{ChatSession, ChatSessionBuilder};
