//! Remote secret store key provider.
//!
//! Speaks the Secret Manager REST shape:
//! `GET {base_url}/v1/projects/{project}/secrets/{secret}/versions/latest:access`
//! returning `{"payload": {"data": "<base64 secret payload>"}}`. The secret
//! payload is itself the base64-encoded key, so it is decoded twice.

use std::time::Duration;

use age::secrecy::{ExposeSecret, SecretString};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use zeroize::Zeroizing;

use super::{KeyError, KeyProvider};
use crate::crypto::EncryptionKey;

pub const DEFAULT_BASE_URL: &str = "https://secretmanager.googleapis.com";
pub const DEFAULT_SECRET_NAME: &str = "disappr-aes-key";

/// Connection settings for the secret store.
#[derive(Debug)]
pub struct SecretManagerConfig {
    pub base_url: String,
    pub project: String,
    pub secret_name: String,
    pub access_token: Option<SecretString>,
    pub timeout: Duration,
}

impl SecretManagerConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.into(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            access_token: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Fully qualified name of the latest secret version.
    pub fn version_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/latest",
            self.project, self.secret_name
        )
    }
}

#[derive(Deserialize)]
struct AccessSecretVersionResponse {
    payload: SecretPayload,
}

#[derive(Deserialize)]
struct SecretPayload {
    data: String,
}

/// Fetches the key from the remote secret store on every call.
pub struct SecretManagerKeyProvider {
    client: reqwest::Client,
    url: String,
    access_token: Option<SecretString>,
}

impl SecretManagerKeyProvider {
    pub fn new(config: SecretManagerConfig) -> Result<Self, KeyError> {
        if config.project.trim().is_empty() {
            return Err(KeyError::NotConfigured(
                "secret store project is not set".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| KeyError::Access(format!("failed to create client: {}", e)))?;
        let url = format!(
            "{}/v1/{}:access",
            config.base_url.trim_end_matches('/'),
            config.version_name()
        );

        Ok(Self {
            client,
            url,
            access_token: config.access_token,
        })
    }
}

#[async_trait]
impl KeyProvider for SecretManagerKeyProvider {
    async fn encryption_key(&self) -> Result<EncryptionKey, KeyError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeyError::Access(e.without_url().to_string()))?;
        let body: AccessSecretVersionResponse = response
            .json()
            .await
            .map_err(|e| KeyError::Access(e.without_url().to_string()))?;

        decode_secret_payload(&body.payload.data)
    }
}

/// Decode the `payload.data` field into a key.
pub(crate) fn decode_secret_payload(data: &str) -> Result<EncryptionKey, KeyError> {
    let payload = Zeroizing::new(
        STANDARD
            .decode(data.trim().as_bytes())
            .map_err(|e| KeyError::Decode(e.to_string()))?,
    );
    let text = std::str::from_utf8(&payload)
        .map_err(|_| KeyError::Decode("secret payload is not valid UTF-8".to_string()))?;
    EncryptionKey::from_base64(text).map_err(|e| KeyError::Decode(e.to_string()))
}
