//! TOML configuration with defaults for the analytics agent.
//!
//! Every section is optional; an empty file yields [`AppConfig::default`].
//!
//! ```rust
//! use dashmind::AppConfig;
//!
//! let config = AppConfig::from_toml_str(
//!     r#"
//!     [session]
//!     max_model_turns = 4
//!
//!     [[backends]]
//!     id = "ollama"
//!     model = "llama3.1"
//!     "#,
//! )
//! .expect("valid config");
//!
//! assert_eq!(config.session.max_model_turns, 4);
//! assert_eq!(config.backends.len(), 1);
//! ```

use std::path::Path;
use std::time::Duration;

use dbackend::{BackendId, FallbackScope, RetryPolicy};
use dchat::ChatPolicy;
use dcommon::GenerationOptions;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TOOL_SERVER_ENTRYPOINT: &str = "analytics-service";

/// Variables handed to the tool server in addition to its base environment.
pub const DEFAULT_ENV_PASSTHROUGH: [&str; 5] = [
    "UMAMI_API_URL",
    "UMAMI_USERNAME",
    "UMAMI_PASSWORD",
    "UMAMI_TEAM_ID",
    "TOKENIZERS_PARALLELISM",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub session: SessionSection,
    pub retry: RetrySection,
    pub backends: Vec<BackendEntry>,
    pub tool_server: ToolServerSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionSection::default(),
            retry: RetrySection::default(),
            backends: vec![
                BackendEntry::new("cloudflare").with_model("@cf/meta/llama-3.1-8b-instruct"),
                BackendEntry::new("ollama").with_model("llama3.2"),
            ],
            tool_server: ToolServerSection::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks cross-field rules that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one [[backends]] entry is required".to_string(),
            ));
        }

        let mut seen = Vec::with_capacity(self.backends.len());
        for entry in &self.backends {
            let id = entry.backend_id()?;
            if seen.contains(&id) {
                return Err(ConfigError::Invalid(format!(
                    "backend '{id}' is configured more than once"
                )));
            }
            seen.push(id);
            entry
                .generation_options()
                .validate()
                .map_err(|message| ConfigError::Invalid(format!("backend '{id}': {message}")))?;
        }

        if self.session.max_model_turns == 0 {
            return Err(ConfigError::Invalid(
                "session.max_model_turns must be at least 1".to_string(),
            ));
        }

        self.session.fallback_scope()?;

        if let Some(command) = &self.tool_server.command {
            if command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(ConfigError::Invalid(
                    "tool_server.command must name a program".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn chat_policy(&self) -> ChatPolicy {
        ChatPolicy::default()
            .with_max_model_turns(self.session.max_model_turns)
            .with_tool_timeout(Duration::from_secs(self.session.tool_timeout_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub max_model_turns: u32,
    pub tool_timeout_secs: u64,
    /// `turn` or `session`.
    pub fallback_scope: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_model_turns: 8,
            tool_timeout_secs: 60,
            fallback_scope: "turn".to_string(),
        }
    }
}

impl SessionSection {
    pub fn fallback_scope(&self) -> Result<FallbackScope, ConfigError> {
        FallbackScope::parse(&self.fallback_scope).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "session.fallback_scope must be 'turn' or 'session', got '{}'",
                self.fallback_scope
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            backoff_multiplier: policy.backoff_multiplier,
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            backoff_multiplier: if self.backoff_multiplier < 1.0 {
                1.0
            } else {
                self.backoff_multiplier
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendEntry {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl BackendEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            model: None,
            timeout_secs: None,
            temperature: None,
            max_tokens: None,
            base_url: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn backend_id(&self) -> Result<BackendId, ConfigError> {
        BackendId::parse(&self.id)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown backend id '{}'", self.id)))
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolServerSection {
    /// Full argv. Defaults to `uv --directory <server dir> run analytics-service`.
    pub command: Option<Vec<String>>,
    pub env_passthrough: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ToolServerSection {
    fn default() -> Self {
        Self {
            command: None,
            env_passthrough: DEFAULT_ENV_PASSTHROUGH
                .iter()
                .map(|key| key.to_string())
                .collect(),
            request_timeout_secs: 30,
        }
    }
}

impl ToolServerSection {
    pub fn command_for(&self, server_dir: &Path) -> Vec<String> {
        match &self.command {
            Some(command) => command.clone(),
            None => vec![
                "uv".to_string(),
                "--directory".to_string(),
                server_dir.display().to_string(),
                "run".to_string(),
                DEFAULT_TOOL_SERVER_ENTRYPOINT.to_string(),
            ],
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
