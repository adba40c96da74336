//! Wiring between configuration, backends, the tool server and chat sessions.

use std::path::Path;
use std::sync::Arc;

use dbackend::{BackendHandle, BackendId, BackendSelector};
use dchat::{ChatError, ChatPolicy, ChatSession};
use dcommon::{SessionId, TraceId};
use dobserve::{SafeBackendHooks, SafeChatHooks, SafeToolHooks, TracingObservabilityHooks};
use dtooling::ToolProvider;
use dtooling::mcp::{McpServerConfig, McpToolProvider};
use tracing::{info, warn};

use crate::config::{AppConfig, ToolServerSection};
use crate::context::{DASHBOARD_PROMPT, ReportTarget, context_turn};
use crate::error::AppError;

/// Builds the selector over `handles` with the configured retry and fallback rules.
///
/// `preferred` moves that backend to the front when it is configured and usable.
pub fn build_selector(
    config: &AppConfig,
    handles: Vec<BackendHandle>,
    preferred: Option<BackendId>,
) -> Result<BackendSelector, AppError> {
    let mut selector = BackendSelector::new(handles)
        .map_err(|err| AppError::startup(err.to_string()))?
        .with_retry_policy(config.retry.policy())
        .with_scope(config.session.fallback_scope()?)
        .with_hooks(Arc::new(SafeBackendHooks::new(TracingObservabilityHooks)));

    if let Some(id) = preferred {
        if !selector.order().contains(&id) {
            warn!(backend = %id, "preferred backend is not usable, keeping configured order");
        }
        selector = selector.prefer(id);
    }

    info!(
        order = ?selector.order().iter().map(ToString::to_string).collect::<Vec<_>>(),
        scope = ?selector.scope(),
        "backend order"
    );

    Ok(selector)
}

pub fn tool_server_config(
    section: &ToolServerSection,
    server_dir: &Path,
    inherit_stderr: bool,
) -> McpServerConfig {
    McpServerConfig::new(section.command_for(server_dir))
        .with_passthrough(section.env_passthrough.iter().map(String::as_str))
        .with_request_timeout(section.request_timeout())
        .with_inherited_stderr(inherit_stderr)
}

pub async fn spawn_tool_server(config: McpServerConfig) -> Result<Arc<McpToolProvider>, AppError> {
    let command = config.command.join(" ");
    let provider = McpToolProvider::spawn(config)
        .await
        .map_err(|err| AppError::startup(format!("tool server `{command}`: {err}")))?;

    Ok(Arc::new(provider))
}

/// Renders the server's dashboard guide for `target`.
///
/// Returns `None` when the server does not offer one or rendering fails.
pub async fn fetch_dashboard_guide(
    provider: &McpToolProvider,
    target: &ReportTarget,
) -> Option<String> {
    let prompts = match provider.list_prompts().await {
        Ok(prompts) => prompts,
        Err(error) => {
            warn!(error = %error, "listing server prompts failed");
            return None;
        }
    };

    if !prompts.iter().any(|prompt| prompt.name == DASHBOARD_PROMPT) {
        info!(
            available = ?prompts.iter().map(|prompt| prompt.name.as_str()).collect::<Vec<_>>(),
            "server offers no dashboard prompt, using the built-in request"
        );
        return None;
    }

    match provider
        .get_prompt(DASHBOARD_PROMPT, &target.prompt_arguments())
        .await
    {
        Ok(guide) => guide,
        Err(error) => {
            warn!(error = %error, "rendering the dashboard prompt failed");
            None
        }
    }
}

/// Opens a session for `target` with tracing hooks on every layer.
pub async fn start_session(
    selector: BackendSelector,
    provider: Arc<dyn ToolProvider>,
    id: impl Into<SessionId>,
    target: &ReportTarget,
    policy: ChatPolicy,
) -> Result<ChatSession, ChatError> {
    let id = id.into();
    let trace_id = TraceId::new(format!("{id}-{}", unix_millis()));

    ChatSession::builder(selector, provider)
        .id(id)
        .context(context_turn(target))
        .policy(policy)
        .hooks(Arc::new(SafeChatHooks::new(TracingObservabilityHooks)))
        .tool_hooks(Arc::new(SafeToolHooks::new(TracingObservabilityHooks)))
        .trace_id(trace_id)
        .start()
        .await
}

fn unix_millis() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
}
