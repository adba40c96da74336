//! Chat-completions transport trait and its reqwest implementation.

use reqwest::{Client, Response};

use crate::{BackendError, BackendFuture};

use crate::adapters::http::{decode_error, retry_after, send_error, status_error};
use super::serde_api::{OpenAiApiResponse, build_api_request, extract_error_message};
use super::types::{OpenAiAuth, OpenAiRequest, OpenAiResponse};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

pub trait OpenAiTransport: Send + Sync + std::fmt::Debug {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> BackendFuture<'a, Result<OpenAiResponse, BackendError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
    label: &'static str,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENAI_BASE_URL.to_string(),
            label: "openai",
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Name used in error messages, e.g. `ollama` for a local server.
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn parse_error(&self, response: Response) -> BackendError {
        let status = response.status();
        let delay = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| format!("{} request failed with status {status}", self.label));

        status_error(status, message, delay)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiRequest,
        auth: OpenAiAuth,
    ) -> BackendFuture<'a, Result<OpenAiResponse, BackendError>> {
        Box::pin(async move {
            let api_request = build_api_request(request)?;
            let response = self
                .client
                .post(self.endpoint("chat/completions"))
                .bearer_auth(auth.bearer())
                .json(&api_request)
                .send()
                .await
                .map_err(|err| send_error(self.label, err))?;

            if !response.status().is_success() {
                return Err(self.parse_error(response).await);
            }

            let parsed: OpenAiApiResponse = response
                .json()
                .await
                .map_err(|err| decode_error(self.label, err))?;

            OpenAiResponse::try_from(parsed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slashes() {
        let transport =
            OpenAiHttpTransport::new(Client::new()).with_base_url("http://localhost:11434/v1/");
        assert_eq!(
            transport.endpoint("chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }
}
