//! In-memory API key storage with redacted debug output.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{BackendError, BackendId};

#[derive(PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }
}

impl Clone for SecretString {
    fn clone(&self) -> Self {
        Self::new(self.value.clone())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        // SAFETY: zero bytes are valid UTF-8.
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

/// Per-backend API keys, shared between adapters.
#[derive(Default)]
pub struct CredentialStore {
    keys: Mutex<HashMap<BackendId, SecretString>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(
        &self,
        backend: BackendId,
        api_key: impl Into<String>,
    ) -> Result<(), BackendError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(BackendError::unavailable(format!(
                "{backend} api key must not be empty"
            )));
        }

        self.keys_mut()?.insert(backend, api_key);
        Ok(())
    }

    pub fn has_credentials(&self, backend: BackendId) -> Result<bool, BackendError> {
        Ok(self.keys_mut()?.contains_key(&backend))
    }

    pub fn api_key(&self, backend: BackendId) -> Result<Option<SecretString>, BackendError> {
        Ok(self.keys_mut()?.get(&backend).cloned())
    }

    pub fn clear(&self, backend: BackendId) -> Result<bool, BackendError> {
        Ok(self.keys_mut()?.remove(&backend).is_some())
    }

    fn keys_mut(&self) -> Result<MutexGuard<'_, HashMap<BackendId, SecretString>>, BackendError> {
        self.keys
            .lock()
            .map_err(|_| BackendError::unavailable("credential store lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SecretString::new("cf-token");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(secret.expose(), "cf-token");
    }

    #[test]
    fn store_rejects_blank_keys_and_round_trips_values() {
        let store = CredentialStore::new();
        assert!(store.set_api_key(BackendId::CloudflareWorkersAi, "  ").is_err());
        assert!(!store
            .has_credentials(BackendId::CloudflareWorkersAi)
            .expect("lock"));

        store
            .set_api_key(BackendId::CloudflareWorkersAi, "cf-token")
            .expect("key should store");
        let key = store
            .api_key(BackendId::CloudflareWorkersAi)
            .expect("lock")
            .expect("key should exist");
        assert_eq!(key.expose(), "cf-token");

        assert!(store.clear(BackendId::CloudflareWorkersAi).expect("lock"));
        assert!(store.api_key(BackendId::CloudflareWorkersAi).expect("lock").is_none());
    }
}
