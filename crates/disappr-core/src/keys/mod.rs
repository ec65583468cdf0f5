//! Symmetric encryption key providers.
//!
//! The lifecycle asks a [`KeyProvider`] for the current content key on every
//! create and view. Implementations:
//! - [`StaticKeyProvider`]: base64 key supplied through the environment
//! - [`KeyfileKeyProvider`]: base64 key in a file, optionally age-encrypted
//! - [`SecretManagerKeyProvider`]: remote secret store over HTTPS

mod keyfile;
mod secret_manager;

use async_trait::async_trait;
use thiserror::Error;

use crate::crypto::EncryptionKey;

pub use age::secrecy::SecretString;
pub use keyfile::{write_keyfile, KeyfileKeyProvider, KeyfileMode};
pub use secret_manager::{
    SecretManagerConfig, SecretManagerKeyProvider, DEFAULT_BASE_URL, DEFAULT_SECRET_NAME,
};

/// Errors from obtaining the encryption key.
#[derive(Debug, Error)]
pub enum KeyError {
    /// No key is configured for this provider
    #[error("encryption key not configured: {0}")]
    NotConfigured(String),

    /// Keyfile could not be read, written or decrypted
    #[error("keyfile error: {0}")]
    Keyfile(String),

    /// The remote secret store rejected or failed the request
    #[error("failed to access secret version: {0}")]
    Access(String),

    /// Key material was not valid base64
    #[error("failed to decode secret data: {0}")]
    Decode(String),
}

/// Source of the service-wide content encryption key.
#[async_trait]
pub trait KeyProvider: Send + Sync {
    /// Fetch the current encryption key.
    ///
    /// Implementations must not log key material.
    async fn encryption_key(&self) -> Result<EncryptionKey, KeyError>;
}

/// A fixed key, typically decoded from an environment variable.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    key: EncryptionKey,
}

impl StaticKeyProvider {
    pub fn new(key: EncryptionKey) -> Self {
        Self { key }
    }

    /// Decode a base64 key.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyError> {
        EncryptionKey::from_base64(encoded)
            .map(Self::new)
            .map_err(|e| KeyError::Decode(e.to_string()))
    }

    /// Read a base64 key from the named environment variable.
    pub fn from_env(var: &str) -> Result<Self, KeyError> {
        let value = std::env::var(var)
            .map_err(|_| KeyError::NotConfigured(format!("{} is not set", var)))?;
        if value.trim().is_empty() {
            return Err(KeyError::NotConfigured(format!("{} is empty", var)));
        }
        Self::from_base64(&value)
    }
}

#[async_trait]
impl KeyProvider for StaticKeyProvider {
    async fn encryption_key(&self) -> Result<EncryptionKey, KeyError> {
        Ok(self.key.clone())
    }
}
