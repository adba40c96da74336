//! Backend capability trait and the configured handle the selector rotates through.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use dcommon::{BoxFuture, GenerationOptions};

use crate::{BackendError, BackendId, BackendReply, Conversation, ToolDescriptor};

pub type BackendFuture<'a, T> = BoxFuture<'a, T>;

/// Everything an adapter needs to serialize one invocation.
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    pub model: &'a str,
    pub options: GenerationOptions,
    pub conversation: &'a Conversation,
    pub tools: &'a [ToolDescriptor],
}

/// A pure translator between the shared conversation model and one provider.
///
/// Implementations never retry; the selector owns retry and fallback.
pub trait Backend: Send + Sync {
    fn id(&self) -> BackendId;

    fn invoke<'a>(
        &'a self,
        request: BackendRequest<'a>,
    ) -> BackendFuture<'a, Result<BackendReply, BackendError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackendProfile {
    pub id: BackendId,
    pub model: String,
    pub options: GenerationOptions,
    pub timeout: Duration,
}

impl BackendProfile {
    pub fn new(id: BackendId, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
            options: GenerationOptions::default(),
            timeout: Duration::from_secs(90),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A backend profile bound to the adapter that serves it.
#[derive(Clone)]
pub struct BackendHandle {
    profile: BackendProfile,
    backend: Arc<dyn Backend>,
}

impl BackendHandle {
    pub fn new(profile: BackendProfile, backend: Arc<dyn Backend>) -> Self {
        Self { profile, backend }
    }

    pub fn id(&self) -> BackendId {
        self.profile.id
    }

    pub fn model(&self) -> &str {
        &self.profile.model
    }

    pub fn profile(&self) -> &BackendProfile {
        &self.profile
    }

    /// Invokes the backend under the profile timeout.
    ///
    /// An elapsed timeout is reported as [`crate::BackendErrorKind::Unavailable`].
    pub async fn invoke(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Result<BackendReply, BackendError> {
        let request = BackendRequest {
            model: &self.profile.model,
            options: self.profile.options,
            conversation,
            tools,
        };

        match tokio::time::timeout(self.profile.timeout, self.backend.invoke(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::unavailable(format!(
                "{} did not answer within {}s",
                self.profile.id,
                self.profile.timeout.as_secs_f64()
            ))),
        }
    }
}

impl Debug for BackendHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
