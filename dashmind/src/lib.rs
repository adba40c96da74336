//! Unified facade over the dashmind workspace crates.
//!
//! Re-exports the backend, tooling, chat and observability crates, and adds the
//! pieces the `dashmind` binary is built from: TOML configuration, backend
//! construction from environment credentials, the analytics context turn, and
//! report rendering.
//!
//! ```rust
//! use dashmind::prelude::*;
//!
//! let config = AppConfig::default();
//! let target = ReportTarget::new("example.com", "2025-06-01", "2025-07-01", "UTC");
//!
//! assert!(config.validate().is_ok());
//! assert!(context_turn(&target).contains("example.com"));
//! ```

mod backends;
mod config;
mod context;
mod error;
mod report;
mod runtime;
mod telemetry;

pub mod prelude;

pub use dbackend;
pub use dchat;
pub use dcommon;
pub use dobserve;
pub use dtooling;

pub use dbackend::{
    Backend, BackendError, BackendErrorKind, BackendHandle, BackendId, BackendProfile,
    BackendReply, BackendResponse, BackendSelector, Conversation, FallbackScope, RetryPolicy,
    ToolCall, ToolDescriptor, ToolPayload, ToolResult, Turn,
};
pub use dchat::{
    ChatError, ChatErrorKind, ChatLoopHooks, ChatPolicy, ChatSession, ChatSessionBuilder,
    LoopState,
};
pub use dcommon::{BoxFuture, GenerationOptions, SessionId, TraceId};
pub use dobserve::{MetricsObservabilityHooks, TracingObservabilityHooks};
pub use dtooling::mcp::{McpServerConfig, McpToolProvider};
pub use dtooling::{ToolCatalog, ToolError, ToolErrorKind, ToolProvider, ToolRegistry, ToolRuntime};

pub use backends::{
    DEFAULT_BACKEND_TIMEOUT, EnvCredentials, backend_profile, build_backends, default_model,
    ollama_api_url, parse_backend_id,
};
pub use config::{
    AppConfig, BackendEntry, DEFAULT_ENV_PASSTHROUGH, DEFAULT_TOOL_SERVER_ENTRYPOINT,
    RetrySection, SessionSection, ToolServerSection,
};
pub use context::{DASHBOARD_PROMPT, ReportTarget, context_turn, dashboard_request};
pub use error::{AppError, ConfigError};
pub use report::{
    FABRICATION_INDICATORS, RULE_WIDTH, detect_fabrication, fabrication_summary, render_report,
};
pub use runtime::{
    build_selector, fetch_dashboard_guide, spawn_tool_server, start_session, tool_server_config,
};
pub use telemetry::{default_directive, init_telemetry};
