//! OpenAI backend over the chat-completions transport.

use std::sync::Arc;

use crate::{
    Backend, BackendError, BackendFuture, BackendId, BackendReply, BackendRequest,
    CredentialStore,
};

use super::auth::resolve_openai_auth;
use super::transport::OpenAiTransport;
use super::types::OpenAiRequest;

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAiBackend {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn OpenAiTransport>,
    fallback_model: String,
}

impl OpenAiBackend {
    pub fn new(credentials: Arc<CredentialStore>, transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            credentials,
            transport,
            fallback_model: OPENAI_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub(crate) fn build_request(&self, request: BackendRequest<'_>) -> OpenAiRequest {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.as_str()
        } else {
            request.model
        };

        OpenAiRequest::from_conversation(model, request.options, request.conversation, request.tools)
    }
}

impl Backend for OpenAiBackend {
    fn id(&self) -> BackendId {
        BackendId::OpenAi
    }

    fn invoke<'a>(
        &'a self,
        request: BackendRequest<'a>,
    ) -> BackendFuture<'a, Result<BackendReply, BackendError>> {
        Box::pin(async move {
            request.options.validate().map_err(BackendError::protocol)?;
            let auth = resolve_openai_auth(&self.credentials)?;
            let openai_request = self.build_request(request);
            let response = self.transport.complete(openai_request, auth).await?;
            response.into_reply(BackendId::OpenAi, request.conversation.len())
        })
    }
}
