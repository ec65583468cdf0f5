//! Keyfile-backed key provider.
//!
//! A keyfile holds the base64-encoded content key. In `encrypted` mode the
//! base64 text is wrapped with age passphrase encryption. The key is loaded
//! and decrypted once, at startup.

use std::io::{Read, Write};
use std::iter;
use std::path::Path;

use age::secrecy::{ExposeSecret, SecretString};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::{KeyError, KeyProvider};
use crate::crypto::EncryptionKey;

/// How the key is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyfileMode {
    /// Base64 text
    #[default]
    Plain,
    /// Base64 text, age passphrase-encrypted
    Encrypted,
}

/// Provider that serves a key loaded from a keyfile at startup.
#[derive(Debug)]
pub struct KeyfileKeyProvider {
    key: EncryptionKey,
}

impl KeyfileKeyProvider {
    /// Read (and if needed decrypt) the keyfile at `path`.
    ///
    /// # Errors
    ///
    /// Returns `KeyError::Keyfile` if the file is unreadable, the passphrase
    /// is missing or wrong, and `KeyError::Decode` if the content is not base64.
    pub fn load(
        path: &Path,
        mode: KeyfileMode,
        passphrase: Option<&SecretString>,
    ) -> Result<Self, KeyError> {
        let raw = Zeroizing::new(std::fs::read(path).map_err(|e| {
            KeyError::Keyfile(format!("failed to read keyfile {}: {}", path.display(), e))
        })?);

        let text = match mode {
            KeyfileMode::Plain => raw,
            KeyfileMode::Encrypted => {
                let passphrase = passphrase.ok_or_else(|| {
                    KeyError::Keyfile("encrypted keyfile requires a passphrase".to_string())
                })?;
                decrypt_with_passphrase(&raw, passphrase)?
            }
        };

        let text = std::str::from_utf8(&text)
            .map_err(|_| KeyError::Decode("keyfile is not valid UTF-8".to_string()))?;
        let key = EncryptionKey::from_base64(text).map_err(|e| KeyError::Decode(e.to_string()))?;

        Ok(Self { key })
    }
}

#[async_trait]
impl KeyProvider for KeyfileKeyProvider {
    async fn encryption_key(&self) -> Result<EncryptionKey, KeyError> {
        Ok(self.key.clone())
    }
}

/// Write `key` to a new keyfile at `path` with owner-only permissions.
///
/// Refuses to overwrite an existing file.
pub fn write_keyfile(
    path: &Path,
    key: &EncryptionKey,
    mode: KeyfileMode,
    passphrase: Option<&SecretString>,
) -> Result<(), KeyError> {
    ensure_parent_dir(path)?;
    if path.exists() {
        return Err(KeyError::Keyfile(format!(
            "keyfile already exists: {}",
            path.display()
        )));
    }

    let encoded = key.to_base64();
    let contents = match mode {
        KeyfileMode::Plain => Zeroizing::new(encoded.as_bytes().to_vec()),
        KeyfileMode::Encrypted => {
            let passphrase = passphrase.ok_or_else(|| {
                KeyError::Keyfile("encrypted keyfile requires a passphrase".to_string())
            })?;
            Zeroizing::new(encrypt_with_passphrase(encoded.as_bytes(), passphrase)?)
        }
    };

    std::fs::write(path, contents.as_slice()).map_err(|e| {
        KeyError::Keyfile(format!("failed to write keyfile {}: {}", path.display(), e))
    })?;
    set_file_permissions(path)?;
    Ok(())
}

fn encrypt_with_passphrase(data: &[u8], passphrase: &SecretString) -> Result<Vec<u8>, KeyError> {
    let encryptor = age::Encryptor::with_user_passphrase(SecretString::from(
        passphrase.expose_secret().to_string(),
    ));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| KeyError::Keyfile(format!("failed to create encryptor: {}", e)))?;
    writer
        .write_all(data)
        .map_err(|e| KeyError::Keyfile(format!("keyfile encryption failed: {}", e)))?;
    writer
        .finish()
        .map_err(|e| KeyError::Keyfile(format!("keyfile encryption failed: {}", e)))?;

    Ok(encrypted)
}

fn decrypt_with_passphrase(
    encrypted: &[u8],
    passphrase: &SecretString,
) -> Result<Zeroizing<Vec<u8>>, KeyError> {
    let decryptor = age::Decryptor::new(encrypted)
        .map_err(|e| KeyError::Keyfile(format!("keyfile is not age-encrypted: {}", e)))?;

    let identity =
        age::scrypt::Identity::new(SecretString::from(passphrase.expose_secret().to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => {
                KeyError::Keyfile("incorrect keyfile passphrase".to_string())
            }
            _ => KeyError::Keyfile(format!("keyfile decryption failed: {}", e)),
        })?;

    let mut decrypted = Zeroizing::new(Vec::new());
    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| KeyError::Keyfile(format!("keyfile decryption failed: {}", e)))?;

    Ok(decrypted)
}

fn ensure_parent_dir(path: &Path) -> Result<(), KeyError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            KeyError::Keyfile(format!(
                "failed to create keyfile directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }
    Ok(())
}

fn set_file_permissions(path: &Path) -> Result<(), KeyError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms).map_err(|e| {
            KeyError::Keyfile(format!(
                "failed to set keyfile permissions {}: {}",
                path.display(),
                e
            ))
        })?;
    }
    Ok(())
}
