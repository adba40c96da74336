//! Model Context Protocol tool server client (JSON-RPC over stdio).

mod protocol;
mod stdio;

pub use protocol::{MCP_PROTOCOL_VERSION, McpPrompt, McpPromptArgument, McpToolDefinition};
pub use stdio::{BASE_ENV_KEYS, DEFAULT_REQUEST_TIMEOUT, McpServerConfig, McpToolProvider};
