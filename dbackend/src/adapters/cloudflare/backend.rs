//! Cloudflare Workers AI backend.

use std::sync::Arc;

use dcommon::GenerationOptions;

use crate::{
    Backend, BackendError, BackendFuture, BackendId, BackendReply, BackendRequest,
    CredentialStore,
};

use super::transport::CloudflareTransport;
use super::wire::CloudflareRequest;

pub const CLOUDFLARE_DEFAULT_MODEL: &str = "@cf/meta/llama-3.1-8b-instruct";

#[derive(Clone)]
pub struct CloudflareBackend {
    credentials: Arc<CredentialStore>,
    transport: Arc<dyn CloudflareTransport>,
    fallback_model: String,
    defaults: GenerationOptions,
}

impl CloudflareBackend {
    pub fn new(credentials: Arc<CredentialStore>, transport: Arc<dyn CloudflareTransport>) -> Self {
        Self {
            credentials,
            transport,
            fallback_model: CLOUDFLARE_DEFAULT_MODEL.to_string(),
            defaults: GenerationOptions::default()
                .with_max_tokens(2048)
                .with_temperature(0.1),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    /// Options used where a request leaves a field unset.
    pub fn with_defaults(mut self, defaults: GenerationOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub(crate) fn build_request(&self, request: BackendRequest<'_>) -> CloudflareRequest {
        CloudflareRequest::from_conversation(
            request.options.or(self.defaults),
            request.conversation,
            request.tools,
        )
    }

    fn model<'a>(&'a self, request: &BackendRequest<'a>) -> &'a str {
        if request.model.trim().is_empty() {
            self.fallback_model.as_str()
        } else {
            request.model
        }
    }
}

impl Backend for CloudflareBackend {
    fn id(&self) -> BackendId {
        BackendId::CloudflareWorkersAi
    }

    fn invoke<'a>(
        &'a self,
        request: BackendRequest<'a>,
    ) -> BackendFuture<'a, Result<BackendReply, BackendError>> {
        Box::pin(async move {
            request.options.validate().map_err(BackendError::protocol)?;
            let token = self
                .credentials
                .api_key(BackendId::CloudflareWorkersAi)?
                .ok_or_else(|| BackendError::unavailable("no Cloudflare API token configured"))?;

            let model = self.model(&request);
            let body = self.build_request(request);
            let response = self.transport.run(model, body, token).await?;
            response.into_reply(model, request.conversation.len())
        })
    }
}
