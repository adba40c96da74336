//! OpenAI credential helpers.

use crate::{BackendError, BackendId, CredentialStore};

use super::types::OpenAiAuth;

impl CredentialStore {
    /// Stores an OpenAI API key. Keys are expected to start with `sk-`.
    pub fn set_openai_api_key(&self, api_key: impl Into<String>) -> Result<(), BackendError> {
        let api_key = api_key.into();
        if !api_key.trim().starts_with("sk-") {
            return Err(BackendError::unavailable(
                "OpenAI API key must start with 'sk-'",
            ));
        }

        self.set_api_key(BackendId::OpenAi, api_key.trim())
    }
}

pub(crate) fn resolve_openai_auth(credentials: &CredentialStore) -> Result<OpenAiAuth, BackendError> {
    credentials
        .api_key(BackendId::OpenAi)?
        .map(OpenAiAuth::ApiKey)
        .ok_or_else(|| BackendError::unavailable("no OpenAI API key configured"))
}
