//! Ollama backend implemented over the OpenAI-compatible transport.

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;

use crate::adapters::http::{decode_error, send_error, status_error};
use crate::adapters::openai::{OpenAiAuth, OpenAiHttpTransport, OpenAiRequest, OpenAiTransport};
use crate::{
    Backend, BackendError, BackendErrorKind, BackendFuture, BackendId, BackendReply,
    BackendRequest,
};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OLLAMA_HOST_URL: &str = "http://localhost:11434";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

#[derive(Clone)]
pub struct OllamaBackend {
    transport: Arc<dyn OpenAiTransport>,
    fallback_model: String,
}

impl OllamaBackend {
    pub fn new(transport: Arc<dyn OpenAiTransport>) -> Self {
        Self {
            transport,
            fallback_model: OLLAMA_DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    pub fn default_http_transport(client: Client) -> OpenAiHttpTransport {
        OpenAiHttpTransport::new(client)
            .with_base_url(OLLAMA_BASE_URL)
            .with_label("ollama")
    }

    fn build_request(&self, request: BackendRequest<'_>) -> OpenAiRequest {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.as_str()
        } else {
            request.model
        };

        OpenAiRequest::from_conversation(model, request.options, request.conversation, request.tools)
    }

    fn auth_placeholder() -> OpenAiAuth {
        OpenAiAuth::Placeholder("ollama-local")
    }
}

impl Backend for OllamaBackend {
    fn id(&self) -> BackendId {
        BackendId::Ollama
    }

    fn invoke<'a>(
        &'a self,
        request: BackendRequest<'a>,
    ) -> BackendFuture<'a, Result<BackendReply, BackendError>> {
        Box::pin(async move {
            request.options.validate().map_err(BackendError::protocol)?;
            let ollama_request = self.build_request(request);
            let response = self
                .transport
                .complete(ollama_request, Self::auth_placeholder())
                .await
                .map_err(with_serve_hint)?;

            response.into_reply(BackendId::Ollama, request.conversation.len())
        })
    }
}

fn with_serve_hint(error: BackendError) -> BackendError {
    if error.kind != BackendErrorKind::Unavailable {
        return error;
    }

    BackendError {
        message: format!("{} (is ollama running?)", error.message),
        ..error
    }
}

/// Names of locally pulled models, sorted.
pub async fn list_ollama_models(
    client: &Client,
    host_url: &str,
) -> Result<Vec<String>, BackendError> {
    let endpoint = format!("{}/api/tags", host_url.trim_end_matches('/'));

    let response = client
        .get(endpoint)
        .send()
        .await
        .map_err(|err| with_serve_hint(send_error("ollama", err)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(
            status,
            format!("ollama model listing failed: {}", truncate(&body, 512)),
            None,
        ));
    }

    let parsed = response
        .json::<OllamaTagsResponse>()
        .await
        .map_err(|err| decode_error("ollama", err))?;

    let mut names = parsed
        .models
        .into_iter()
        .map(|model| model.name)
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

fn truncate(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((index, _)) => format!("{}...", &input[..index]),
        None => input.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelTag>,
}

#[derive(Debug, Deserialize)]
struct OllamaModelTag {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_errors_gain_a_serve_hint() {
        let hinted = with_serve_hint(BackendError::unavailable("connection refused"));
        assert!(hinted.message.ends_with("(is ollama running?)"));
        assert_eq!(hinted.kind, BackendErrorKind::Unavailable);

        let untouched = with_serve_hint(BackendError::protocol("garbled"));
        assert_eq!(untouched.message, "garbled");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééé", 2), "éé...");
    }
}
