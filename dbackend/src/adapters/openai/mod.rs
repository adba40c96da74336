mod auth;
mod backend;
mod serde_api;
mod transport;
mod types;

pub use backend::{OPENAI_DEFAULT_MODEL, OpenAiBackend};
pub use transport::{OPENAI_BASE_URL, OpenAiHttpTransport, OpenAiTransport};
pub use types::{
    OpenAiAssistantMessage, OpenAiAuth, OpenAiFinishReason, OpenAiMessage, OpenAiRequest,
    OpenAiResponse, OpenAiRole, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
