//! Common imports for dashmind applications.

pub use crate::{
    AppConfig, AppError, BackendEntry, ConfigError, EnvCredentials, ReportTarget, build_backends,
    build_selector, context_turn, dashboard_request, detect_fabrication, fabrication_summary,
    fetch_dashboard_guide, render_report, spawn_tool_server, start_session, tool_server_config,
};
pub use crate::{
    BackendId, BackendSelector, ChatError, ChatErrorKind, ChatPolicy, ChatSession, FallbackScope,
    McpServerConfig, McpToolProvider, RetryPolicy, SessionId, ToolProvider,
};
