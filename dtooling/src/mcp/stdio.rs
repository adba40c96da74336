//! MCP client over a child process's stdin/stdout.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::debug;

use dbackend::{ToolCall, ToolDescriptor, ToolPayload};

use crate::{ToolError, ToolErrorKind, ToolExecutionContext, ToolFuture, ToolProvider};

use super::protocol::{
    CallToolParams, CallToolResult, ClientInfo, GetPromptResult, InitializeParams,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListPromptsResult, ListToolsResult,
    MCP_PROTOCOL_VERSION, McpPrompt,
};

/// Variables a child always inherits when set in the parent.
pub const BASE_ENV_KEYS: [&str; 5] = ["PATH", "HOME", "USER", "LANG", "TERM"];

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on `nextCursor` pages followed for one listing.
const MAX_PAGES: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub request_timeout: Duration,
    pub client_name: String,
    pub inherit_stderr: bool,
}

impl McpServerConfig {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            env: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client_name: "dashmind".to_string(),
            inherit_stderr: false,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Copies each named variable from the current process when it is set.
    pub fn with_passthrough<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        for key in keys {
            if let Ok(value) = std::env::var(key) {
                self.env.insert(key.to_string(), value);
            }
        }
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_inherited_stderr(mut self, inherit: bool) -> Self {
        self.inherit_stderr = inherit;
        self
    }
}

struct StdioChannel {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Set while a line is being written; still set if that write was cancelled.
    partial_write: bool,
}

impl StdioChannel {
    /// Writes one framed message, first ending any fragment a cancelled write left behind.
    async fn send(&mut self, line: &str) -> Result<(), ToolError> {
        if self.partial_write {
            write_bytes(&mut self.stdin, b"\n").await?;
        }

        self.partial_write = true;
        write_bytes(&mut self.stdin, line.as_bytes()).await?;
        self.partial_write = false;
        Ok(())
    }
}

/// A spawned MCP tool server.
///
/// Requests are serialized: one request's write and its matching read happen
/// under a single lock, so replies cannot be stolen by a concurrent caller.
pub struct McpToolProvider {
    label: String,
    next_id: AtomicU64,
    channel: Mutex<StdioChannel>,
    child: Mutex<Option<Child>>,
    request_timeout: Duration,
}

impl McpToolProvider {
    /// Spawns the server and completes the `initialize` handshake.
    pub async fn spawn(config: McpServerConfig) -> Result<Self, ToolError> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| ToolError::provider_unavailable("tool server command is empty"))?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(if config.inherit_stderr {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        command.env_clear();
        for key in BASE_ENV_KEYS {
            if let Ok(value) = std::env::var(key) {
                command.env(key, value);
            }
        }
        command.envs(&config.env);

        let mut child = command.spawn().map_err(|err| {
            ToolError::provider_unavailable(format!("failed to spawn '{program}': {err}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::provider_unavailable("failed to capture tool server stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ToolError::provider_unavailable("failed to capture tool server stdout")
        })?;

        let provider = Self {
            label: program.clone(),
            next_id: AtomicU64::new(1),
            channel: Mutex::new(StdioChannel {
                stdin,
                stdout: BufReader::new(stdout),
                partial_write: false,
            }),
            child: Mutex::new(Some(child)),
            request_timeout: config.request_timeout,
        };

        provider.initialize(&config.client_name).await?;
        Ok(provider)
    }

    async fn initialize(&self, client_name: &str) -> Result<(), ToolError> {
        let params = InitializeParams {
            protocol_version: MCP_PROTOCOL_VERSION,
            capabilities: json!({}),
            client_info: ClientInfo {
                name: client_name,
                version: env!("CARGO_PKG_VERSION"),
            },
        };

        let response = self
            .request("initialize", Some(to_params(&params)?))
            .await
            .map_err(unreachable_server)?;
        debug!(server = %self.label, response = %response, "tool server initialized");

        self.notify("notifications/initialized").await
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut descriptors = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let params = cursor.as_ref().map(|cursor| json!({ "cursor": cursor }));
            let page: ListToolsResult = self
                .typed_request("tools/list", params)
                .await
                .map_err(unreachable_server)?;

            for definition in page.tools {
                descriptors.push(definition.into_descriptor()?);
            }

            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(descriptors),
            }
        }

        Err(ToolError::schema(format!(
            "tool listing did not finish within {MAX_PAGES} pages"
        )))
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<ToolPayload, ToolError> {
        let params = CallToolParams { name, arguments };
        let result: CallToolResult = self
            .typed_request("tools/call", Some(to_params(&params)?))
            .await?;

        result.into_payload().map_err(|error| error.with_tool_name(name))
    }

    pub async fn list_prompts(&self) -> Result<Vec<McpPrompt>, ToolError> {
        let mut prompts = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let params = cursor.as_ref().map(|cursor| json!({ "cursor": cursor }));
            let page: ListPromptsResult = self.typed_request("prompts/list", params).await?;
            prompts.extend(page.prompts);

            match page.next_cursor.filter(|next| !next.is_empty()) {
                Some(next) => cursor = Some(next),
                None => return Ok(prompts),
            }
        }

        Err(ToolError::schema(format!(
            "prompt listing did not finish within {MAX_PAGES} pages"
        )))
    }

    /// Renders a server prompt. `None` when it produced no user text.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
    ) -> Result<Option<String>, ToolError> {
        let params = json!({ "name": name, "arguments": arguments });
        let result: GetPromptResult = self.typed_request("prompts/get", Some(params)).await?;
        Ok(result.into_text())
    }

    /// Kills the child process. Later requests fail as unavailable.
    pub async fn shutdown(&self) {
        let mut child = self.child.lock().await;
        if let Some(mut running) = child.take() {
            let _ = running.kill().await;
            debug!(server = %self.label, "tool server stopped");
        }
    }

    async fn typed_request<T>(&self, method: &str, params: Option<Value>) -> Result<T, ToolError>
    where
        T: DeserializeOwned,
    {
        let value = self.request(method, params).await?;
        serde_json::from_value(value)
            .map_err(|err| ToolError::schema(format!("unexpected {method} result: {err}")))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ToolError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_line(&JsonRpcRequest::new(id, method, params))?;

        let exchange = async {
            let mut channel = self.channel.lock().await;
            channel.send(&line).await?;
            self.read_response(&mut channel.stdout, id).await
        };

        let response = tokio::time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| {
                ToolError::timeout(format!(
                    "{method} got no reply within {}s",
                    self.request_timeout.as_secs_f64()
                ))
            })??;

        response.into_result()
    }

    async fn notify(&self, method: &str) -> Result<(), ToolError> {
        let line = encode_line(&JsonRpcNotification {
            jsonrpc: "2.0",
            method,
        })?;
        self.channel.lock().await.send(&line).await
    }

    async fn read_response(
        &self,
        stdout: &mut BufReader<ChildStdout>,
        expected_id: u64,
    ) -> Result<JsonRpcResponse, ToolError> {
        let mut buffer = String::new();
        loop {
            buffer.clear();
            let read = stdout.read_line(&mut buffer).await.map_err(|err| {
                ToolError::provider_unavailable(format!("reading from tool server failed: {err}"))
            })?;
            if read == 0 {
                return Err(ToolError::provider_unavailable("tool server closed stdout"));
            }

            let trimmed = buffer.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(response) if response.id == Some(expected_id) => return Ok(response),
                Ok(response) => {
                    debug!(server = %self.label, id = ?response.id, "skipping unrelated message");
                }
                Err(_) => {
                    debug!(server = %self.label, line = trimmed, "skipping non JSON-RPC line");
                }
            }
        }
    }
}

impl ToolProvider for McpToolProvider {
    fn discover<'a>(&'a self) -> ToolFuture<'a, Result<Vec<ToolDescriptor>, ToolError>> {
        Box::pin(self.list_tools())
    }

    fn dispatch<'a>(
        &'a self,
        call: &'a ToolCall,
        context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<ToolPayload, ToolError>> {
        Box::pin(async move {
            debug!(
                server = %self.label,
                session_id = %context.session_id,
                tool = %call.name,
                call_id = %call.id,
                "dispatching tool call"
            );
            self.call_tool(&call.name, &call.arguments).await
        })
    }
}

fn to_params<T: serde::Serialize>(params: &T) -> Result<Value, ToolError> {
    serde_json::to_value(params)
        .map_err(|err| ToolError::invalid_arguments(format!("could not encode params: {err}")))
}

fn encode_line<T: serde::Serialize>(message: &T) -> Result<String, ToolError> {
    let mut line = serde_json::to_string(message)
        .map_err(|err| ToolError::invalid_arguments(format!("could not encode request: {err}")))?;
    line.push('\n');
    Ok(line)
}

async fn write_bytes(stdin: &mut ChildStdin, bytes: &[u8]) -> Result<(), ToolError> {
    stdin.write_all(bytes).await.map_err(|err| {
        ToolError::provider_unavailable(format!("writing to tool server failed: {err}"))
    })?;
    stdin.flush().await.map_err(|err| {
        ToolError::provider_unavailable(format!("writing to tool server failed: {err}"))
    })
}

/// Discovery-time failures other than timeouts mean the server is unusable.
fn unreachable_server(error: ToolError) -> ToolError {
    match error.kind {
        ToolErrorKind::Execution => ToolError {
            kind: ToolErrorKind::ProviderUnavailable,
            retryable: true,
            ..error
        },
        _ => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_copies_only_set_variables() {
        let config = McpServerConfig::new(vec!["uv".to_string()])
            .with_env("UMAMI_TEAM_ID", "team-1")
            .with_passthrough(["DASHMIND_TEST_SURELY_UNSET_VARIABLE"]);

        assert_eq!(config.env.get("UMAMI_TEAM_ID").map(String::as_str), Some("team-1"));
        assert!(!config.env.contains_key("DASHMIND_TEST_SURELY_UNSET_VARIABLE"));
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[test]
    fn execution_errors_during_discovery_mean_unavailable() {
        let mapped = unreachable_server(ToolError::execution("JSON-RPC error -32601"));
        assert_eq!(mapped.kind, ToolErrorKind::ProviderUnavailable);

        let timeout = unreachable_server(ToolError::timeout("slow"));
        assert_eq!(timeout.kind, ToolErrorKind::Timeout);
    }
}
