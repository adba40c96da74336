//! Workers AI transport trait and reqwest implementation.

use reqwest::Client;

use crate::adapters::http::{retry_after, send_error, status_error};
use crate::{BackendError, BackendFuture, SecretString};

use super::wire::{CloudflareRequest, CloudflareResponse, extract_error_message, parse_envelope};

pub const CLOUDFLARE_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

pub trait CloudflareTransport: Send + Sync + std::fmt::Debug {
    fn run<'a>(
        &'a self,
        model: &'a str,
        request: CloudflareRequest,
        token: SecretString,
    ) -> BackendFuture<'a, Result<CloudflareResponse, BackendError>>;
}

#[derive(Debug, Clone)]
pub struct CloudflareHttpTransport {
    client: Client,
    base_url: String,
    account_id: String,
}

impl CloudflareHttpTransport {
    pub fn new(client: Client, account_id: impl Into<String>) -> Self {
        Self {
            client,
            base_url: CLOUDFLARE_BASE_URL.to_string(),
            account_id: account_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url.trim_end_matches('/'),
            self.account_id,
            model.trim_start_matches('/')
        )
    }
}

impl CloudflareTransport for CloudflareHttpTransport {
    fn run<'a>(
        &'a self,
        model: &'a str,
        request: CloudflareRequest,
        token: SecretString,
    ) -> BackendFuture<'a, Result<CloudflareResponse, BackendError>> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.endpoint(model))
                .bearer_auth(token.expose())
                .json(&request)
                .send()
                .await
                .map_err(|err| send_error("cloudflare", err))?;

            let status = response.status();
            let delay = retry_after(response.headers());
            let body = response
                .text()
                .await
                .map_err(|err| send_error("cloudflare", err))?;

            if !status.is_success() {
                let message = extract_error_message(&body).unwrap_or_else(|| {
                    format!("cloudflare request failed with status {status}")
                });
                return Err(status_error(status, message, delay));
            }

            parse_envelope(&body)
        })
    }
}
