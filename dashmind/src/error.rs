//! Binary-level errors and their process exit codes.

use std::path::PathBuf;

use dchat::ChatError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("startup failed: {0}")]
    Startup(String),
    #[error("turn failed: {0}")]
    Turn(ChatError),
    #[error("terminal i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup(message.into())
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Startup(_) => 3,
            Self::Turn(_) => 4,
            Self::Io(_) => 1,
        }
    }
}

impl From<ChatError> for AppError {
    fn from(error: ChatError) -> Self {
        if error.is_startup_fatal() {
            Self::Startup(error.to_string())
        } else {
            Self::Turn(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use dchat::ChatErrorKind;
    use dtooling::ToolError;

    use super::*;

    #[test]
    fn tool_provider_failures_surface_as_startup_errors() {
        let error = AppError::from(ChatError::from(ToolError::provider_unavailable(
            "analytics server exited",
        )));
        assert!(matches!(error, AppError::Startup(_)));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn turn_failures_keep_the_chat_error() {
        let error = AppError::from(ChatError::max_turns_exceeded(3, Some("partial".to_string())));
        match &error {
            AppError::Turn(inner) => {
                assert_eq!(inner.kind, ChatErrorKind::MaxTurnsExceeded);
                assert_eq!(inner.partial_answer.as_deref(), Some("partial"));
            }
            other => panic!("expected turn error, got {other:?}"),
        }
        assert_eq!(error.exit_code(), 4);
    }

    #[test]
    fn config_errors_use_their_own_exit_code() {
        let error = AppError::from(ConfigError::Invalid("no backends".to_string()));
        assert_eq!(error.to_string(), "invalid config: no backends");
        assert_eq!(error.exit_code(), 2);
    }
}
