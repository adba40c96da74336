//! Backend construction from configuration and environment credentials.

use std::sync::Arc;
use std::time::Duration;

use dbackend::{Backend, BackendHandle, BackendId, BackendProfile};
use reqwest::Client;
use tracing::{info, warn};

use crate::config::BackendEntry;
use crate::error::AppError;

pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(90);

/// Credentials and endpoints read from the process environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvCredentials {
    pub cloudflare_account_id: Option<String>,
    pub cloudflare_api_token: Option<String>,
    pub openai_api_key: Option<String>,
    pub ollama_base_url: Option<String>,
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("cloudflare_account_id", &self.cloudflare_account_id)
            .field(
                "cloudflare_api_token",
                &self.cloudflare_api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ollama_base_url", &self.ollama_base_url)
            .finish()
    }
}

impl EnvCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            cloudflare_account_id: read("CLOUDFLARE_ACCOUNT_ID"),
            cloudflare_api_token: read("CLOUDFLARE_API_TOKEN"),
            openai_api_key: read("OPENAI_API_KEY"),
            ollama_base_url: read("OLLAMA_BASE_URL"),
        }
    }
}

pub fn parse_backend_id(value: &str) -> Option<BackendId> {
    BackendId::parse(value)
}

/// Builds one handle per usable entry, in configured order.
///
/// Entries whose credentials are missing are skipped with a warning. Zero usable
/// entries is a startup error.
pub fn build_backends(
    entries: &[BackendEntry],
    credentials: &EnvCredentials,
) -> Result<Vec<BackendHandle>, AppError> {
    let mut handles = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        let id = entry.backend_id()?;
        let profile = backend_profile(id, entry);
        match build_backend(id, entry, credentials, profile.timeout) {
            Ok(backend) => {
                info!(backend = %id, model = %profile.model, "backend configured");
                handles.push(BackendHandle::new(profile, backend));
            }
            Err(reason) => {
                warn!(backend = %id, reason = %reason, "skipping backend");
                skipped.push(format!("{id}: {reason}"));
            }
        }
    }

    if handles.is_empty() {
        return Err(AppError::startup(format!(
            "no usable backend ({})",
            skipped.join("; ")
        )));
    }

    Ok(handles)
}

pub fn backend_profile(id: BackendId, entry: &BackendEntry) -> BackendProfile {
    let model = entry
        .model
        .clone()
        .filter(|model| !model.trim().is_empty())
        .unwrap_or_else(|| default_model(id).to_string());
    let timeout = entry
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT);

    BackendProfile::new(id, model)
        .with_options(entry.generation_options())
        .with_timeout(timeout)
}

pub fn default_model(id: BackendId) -> &'static str {
    match id {
        BackendId::CloudflareWorkersAi => "@cf/meta/llama-3.1-8b-instruct",
        BackendId::Ollama => "llama3.2",
        BackendId::OpenAi => "gpt-4o-mini",
    }
}

/// Accepts either the Ollama host or its `/v1` API root.
pub fn ollama_api_url(base: &str) -> String {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.ends_with("/v1") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/v1")
    }
}

fn http_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| format!("http client: {err}"))
}

fn build_backend(
    id: BackendId,
    entry: &BackendEntry,
    credentials: &EnvCredentials,
    timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    match id {
        BackendId::CloudflareWorkersAi => build_cloudflare_backend(entry, credentials, timeout),
        BackendId::Ollama => build_ollama_backend(entry, credentials, timeout),
        BackendId::OpenAi => build_openai_backend(entry, credentials, timeout),
    }
}

#[cfg(feature = "backend-cloudflare")]
fn build_cloudflare_backend(
    entry: &BackendEntry,
    credentials: &EnvCredentials,
    timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    use dbackend::CredentialStore;
    use dbackend::adapters::cloudflare::{CloudflareBackend, CloudflareHttpTransport};

    let (Some(account_id), Some(token)) = (
        credentials.cloudflare_account_id.as_ref(),
        credentials.cloudflare_api_token.as_ref(),
    ) else {
        return Err("CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_API_TOKEN must both be set".to_string());
    };

    let store = Arc::new(CredentialStore::new());
    store
        .set_api_key(BackendId::CloudflareWorkersAi, token.as_str())
        .map_err(|err| err.to_string())?;

    let mut transport = CloudflareHttpTransport::new(http_client(timeout)?, account_id.as_str());
    if let Some(base_url) = &entry.base_url {
        transport = transport.with_base_url(base_url.as_str());
    }

    Ok(Arc::new(CloudflareBackend::new(store, Arc::new(transport))))
}

#[cfg(not(feature = "backend-cloudflare"))]
fn build_cloudflare_backend(
    _entry: &BackendEntry,
    _credentials: &EnvCredentials,
    _timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    Err("built without the backend-cloudflare feature".to_string())
}

#[cfg(feature = "backend-ollama")]
fn build_ollama_backend(
    entry: &BackendEntry,
    credentials: &EnvCredentials,
    timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    use dbackend::adapters::ollama::{OLLAMA_BASE_URL, OllamaBackend};

    let base_url = entry
        .base_url
        .as_deref()
        .or(credentials.ollama_base_url.as_deref())
        .map(ollama_api_url)
        .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());

    let transport =
        OllamaBackend::default_http_transport(http_client(timeout)?).with_base_url(base_url);
    Ok(Arc::new(OllamaBackend::new(Arc::new(transport))))
}

#[cfg(not(feature = "backend-ollama"))]
fn build_ollama_backend(
    _entry: &BackendEntry,
    _credentials: &EnvCredentials,
    _timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    Err("built without the backend-ollama feature".to_string())
}

#[cfg(feature = "backend-openai")]
fn build_openai_backend(
    entry: &BackendEntry,
    credentials: &EnvCredentials,
    timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    use dbackend::CredentialStore;
    use dbackend::adapters::openai::{OpenAiBackend, OpenAiHttpTransport};

    let Some(api_key) = credentials.openai_api_key.as_ref() else {
        return Err("OPENAI_API_KEY is not set".to_string());
    };

    let store = Arc::new(CredentialStore::new());
    store
        .set_openai_api_key(api_key.as_str())
        .map_err(|err| err.to_string())?;

    let mut transport = OpenAiHttpTransport::new(http_client(timeout)?);
    if let Some(base_url) = &entry.base_url {
        transport = transport.with_base_url(base_url.as_str());
    }

    Ok(Arc::new(OpenAiBackend::new(store, Arc::new(transport))))
}

#[cfg(not(feature = "backend-openai"))]
fn build_openai_backend(
    _entry: &BackendEntry,
    _credentials: &EnvCredentials,
    _timeout: Duration,
) -> Result<Arc<dyn Backend>, String> {
    Err("built without the backend-openai feature".to_string())
}
