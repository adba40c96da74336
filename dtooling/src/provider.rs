//! The seam between the loop and wherever tools actually live.

use dbackend::{ToolCall, ToolDescriptor, ToolPayload};

use crate::{ToolError, ToolExecutionContext, ToolFuture};

/// A source of tools: an in-process registry or an external tool server.
///
/// `discover` is called once per session; `dispatch` once per requested call.
pub trait ToolProvider: Send + Sync {
    fn discover<'a>(&'a self) -> ToolFuture<'a, Result<Vec<ToolDescriptor>, ToolError>>;

    fn dispatch<'a>(
        &'a self,
        call: &'a ToolCall,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolPayload, ToolError>>;
}
