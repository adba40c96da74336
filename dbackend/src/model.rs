//! Provider-agnostic tool and reply types shared by every backend adapter.
//!
//! ```rust
//! use dbackend::{ArgumentKind, ToolDescriptor};
//! use serde_json::json;
//!
//! let descriptor = ToolDescriptor::from_json_schema(
//!     "get_website_stats",
//!     "Summary stats for one website",
//!     json!({
//!         "type": "object",
//!         "properties": {
//!             "website_id": {"type": "string"},
//!             "start_at": {"type": "integer"}
//!         },
//!         "required": ["website_id"]
//!     }),
//! )
//! .expect("schema should parse");
//!
//! let website = descriptor.schema.argument("website_id").expect("argument should exist");
//! assert!(website.required);
//! assert_eq!(website.kind, ArgumentKind::String);
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde_json::{Map, Value};

use crate::BackendError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendId {
    CloudflareWorkersAi,
    Ollama,
    OpenAi,
}

impl BackendId {
    pub const ALL: [BackendId; 3] = [Self::CloudflareWorkersAi, Self::Ollama, Self::OpenAi];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloudflare" | "workers-ai" | "workers_ai" | "cf" => Some(Self::CloudflareWorkersAi),
            "ollama" | "local" => Some(Self::Ollama),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

impl Display for BackendId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            Self::CloudflareWorkersAi => "cloudflare",
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        };

        f.write_str(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentKind {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    Any,
}

impl ArgumentKind {
    fn from_schema(property: &Value) -> Self {
        let declared = match property.get("type") {
            Some(Value::String(kind)) => Some(kind.as_str()),
            Some(Value::Array(kinds)) => kinds
                .iter()
                .filter_map(Value::as_str)
                .find(|kind| *kind != "null"),
            _ => None,
        };

        match declared {
            Some("string") => Self::String,
            Some("number") => Self::Number,
            Some("integer") => Self::Integer,
            Some("boolean") => Self::Boolean,
            Some("object") => Self::Object,
            Some("array") => Self::Array,
            _ => Self::Any,
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    pub kind: ArgumentKind,
    pub required: bool,
    pub description: Option<String>,
}

/// Normalized argument schema plus the raw JSON schema it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSchema {
    pub properties: BTreeMap<String, ArgumentSpec>,
    pub raw: Value,
}

impl Default for ToolSchema {
    fn default() -> Self {
        Self {
            properties: BTreeMap::new(),
            raw: serde_json::json!({"type": "object", "properties": {}}),
        }
    }
}

impl ToolSchema {
    pub fn from_json_schema(raw: Value) -> Result<Self, String> {
        if raw.is_null() {
            return Ok(Self::default());
        }

        let object = raw
            .as_object()
            .ok_or_else(|| "argument schema must be a JSON object".to_string())?;

        let mut properties = BTreeMap::new();
        match object.get("properties") {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => {
                for (name, property) in entries {
                    if !property.is_object() {
                        return Err(format!("schema for argument '{name}' must be an object"));
                    }

                    properties.insert(
                        name.clone(),
                        ArgumentSpec {
                            kind: ArgumentKind::from_schema(property),
                            required: false,
                            description: property
                                .get("description")
                                .and_then(Value::as_str)
                                .map(ToString::to_string),
                        },
                    );
                }
            }
            Some(_) => return Err("schema 'properties' must be an object".to_string()),
        }

        match object.get("required") {
            None | Some(Value::Null) => {}
            Some(Value::Array(names)) => {
                for name in names {
                    let name = name
                        .as_str()
                        .ok_or_else(|| "schema 'required' entries must be strings".to_string())?;
                    properties
                        .entry(name.to_string())
                        .or_insert(ArgumentSpec {
                            kind: ArgumentKind::Any,
                            required: true,
                            description: None,
                        })
                        .required = true;
                }
            }
            Some(_) => return Err("schema 'required' must be an array".to_string()),
        }

        Ok(Self { properties, raw })
    }

    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.properties.get(name)
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: ToolSchema) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
        }
    }

    pub fn from_json_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        raw_schema: Value,
    ) -> Result<Self, String> {
        Ok(Self::new(
            name,
            description,
            ToolSchema::from_json_schema(raw_schema)?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Parses wire-level argument text. Blank text means no arguments.
    pub fn parse_arguments(raw: &str) -> Result<Map<String, Value>, BackendError> {
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }

        let value = serde_json::from_str::<Value>(raw).map_err(|err| {
            BackendError::protocol(format!("tool arguments are not valid JSON: {err}"))
        })?;

        Self::arguments_from_value(value)
    }

    pub fn arguments_from_value(value: Value) -> Result<Map<String, Value>, BackendError> {
        match value {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            Value::String(text) => Self::parse_arguments(&text),
            other => Err(BackendError::protocol(format!(
                "tool arguments must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn arguments_json(&self) -> String {
        Value::Object(self.arguments.clone()).to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Text(String),
    Structured(Value),
}

impl ToolPayload {
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Structured(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(ToolPayload),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn payload(&self) -> Option<&ToolPayload> {
        match self {
            Self::Success(payload) => Some(payload),
            Self::Failure(_) => None,
        }
    }

    /// Text a model sees for this outcome. Failures stay visible.
    pub fn render_for_model(&self) -> String {
        match self {
            Self::Success(payload) => payload.render(),
            Self::Failure(message) => format!("tool call failed: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, payload: ToolPayload) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Success(payload),
        }
    }

    pub fn failure(call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            outcome: ToolOutcome::Failure(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendResponse {
    FinalAnswer(String),
    ToolCalls {
        calls: Vec<ToolCall>,
        commentary: Option<String>,
    },
}

impl BackendResponse {
    pub fn final_answer(text: impl Into<String>) -> Self {
        Self::FinalAnswer(text.into())
    }

    pub fn tool_calls(calls: Vec<ToolCall>) -> Self {
        Self::ToolCalls {
            calls,
            commentary: None,
        }
    }

    /// Builds a response from assistant text plus requested calls.
    ///
    /// Calls win over text; blank text with no calls is a protocol error.
    pub fn from_parts(text: Option<String>, calls: Vec<ToolCall>) -> Result<Self, BackendError> {
        let text = text.filter(|value| !value.trim().is_empty());
        if !calls.is_empty() {
            return Ok(Self::ToolCalls {
                calls,
                commentary: text,
            });
        }

        text.map(Self::FinalAnswer).ok_or_else(|| {
            BackendError::protocol("reply contained neither text nor tool calls")
        })
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::FinalAnswer(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendReply {
    pub backend: BackendId,
    pub model: String,
    pub response: BackendResponse,
    pub usage: TokenUsage,
}
