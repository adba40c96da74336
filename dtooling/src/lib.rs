//! Tool discovery, validation and dispatch for the analytics agent.

mod catalog;
mod context;
mod error;
mod hooks;
mod provider;
mod registry;
mod runtime;
mod tool;

pub mod mcp;

pub mod prelude {
    pub use crate::{
        FunctionTool, Tool, ToolCatalog, ToolError, ToolErrorKind, ToolExecutionContext,
        ToolFuture, ToolProvider, ToolRegistry, ToolRuntime,
    };
    pub use crate::mcp::{McpServerConfig, McpToolProvider};
}

pub use catalog::ToolCatalog;
pub use context::ToolExecutionContext;
pub use error::{ToolError, ToolErrorKind};
pub use hooks::{NoopToolRuntimeHooks, ToolRuntimeHooks};
pub use provider::ToolProvider;
pub use registry::ToolRegistry;
pub use runtime::{DEFAULT_TOOL_TIMEOUT, ToolRuntime};
pub use tool::{FunctionTool, Tool, ToolFuture};
