use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;

/// Well-known key the access token is stored under
pub const ACCESS_KEY: &str = "access";

const SERVICE_NAME: &str = "sopdesk";

/// Storage for the current bearer token.
///
/// Read before every outgoing request, replaced on login and refresh,
/// removed on logout.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<String>>;

    fn store(&self, token: &str) -> Result<()>;

    /// Remove the token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    fn store(&self, token: &str) -> Result<()> {
        let mut guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.token.lock().unwrap_or_else(|e| e.into_inner());
        *guard = None;
        Ok(())
    }
}

/// Access token kept in the OS keychain
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, ACCESS_KEY).context("Failed to create keyring entry")
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn store(&self, token: &str) -> Result<()> {
        self.entry()?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.store("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));

        store.store("xyz").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("xyz"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    #[ignore = "needs an OS keychain"]
    fn test_keyring_store_round_trip() {
        let store = KeyringCredentialStore::with_service("sopdesk-test");
        store.clear().unwrap();

        store.store("abc").unwrap();
        // A fresh handle must see the token, not just the instance that wrote it
        let reopened = KeyringCredentialStore::with_service("sopdesk-test");
        assert_eq!(reopened.load().unwrap().as_deref(), Some("abc"));

        reopened.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store_with_token() {
        let store = MemoryCredentialStore::with_token("seed");
        assert_eq!(store.load().unwrap().as_deref(), Some("seed"));
    }
}
