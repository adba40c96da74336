//! Backend error kinds and value helpers.
//!
//! Only rate limiting is retryable; everything else moves the selector on to
//! the next backend.
//!
//! ```rust
//! use std::time::Duration;
//! use dbackend::BackendError;
//!
//! let limited = BackendError::rate_limited("slow down").with_retry_after(Duration::from_secs(2));
//! assert!(limited.retryable);
//! assert_eq!(limited.retry_after, Some(Duration::from_secs(2)));
//!
//! let offline = BackendError::unavailable("connection refused");
//! assert!(!offline.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Network, authentication, missing install or timeout.
    Unavailable,
    RateLimited,
    /// The backend answered with something that could not be understood.
    Protocol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
            retry_after: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unavailable, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::RateLimited, message, true)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, message, false)
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

impl Display for BackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for BackendError {}
