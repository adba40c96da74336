//! Lifecycle hooks around a single tool dispatch.
//!
//! ```rust
//! use dtooling::{NoopToolRuntimeHooks, ToolRuntimeHooks};
//!
//! fn assert_hooks_trait(_hooks: &dyn ToolRuntimeHooks) {}
//!
//! let hooks = NoopToolRuntimeHooks;
//! assert_hooks_trait(&hooks);
//! ```

use std::time::Duration;

use dbackend::{ToolCall, ToolPayload};

use crate::{ToolError, ToolExecutionContext};

pub trait ToolRuntimeHooks: Send + Sync {
    fn on_dispatch_start(&self, _call: &ToolCall, _context: &ToolExecutionContext) {}

    fn on_dispatch_success(
        &self,
        _call: &ToolCall,
        _context: &ToolExecutionContext,
        _payload: &ToolPayload,
        _elapsed: Duration,
    ) {
    }

    fn on_dispatch_failure(
        &self,
        _call: &ToolCall,
        _context: &ToolExecutionContext,
        _error: &ToolError,
        _elapsed: Duration,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopToolRuntimeHooks;

impl ToolRuntimeHooks for NoopToolRuntimeHooks {}
