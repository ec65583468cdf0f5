//! AES-256-GCM sealing of note content.
//!
//! The routine is stateless: a pure function of `(input, key)` plus the OS
//! random source for nonces.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use thiserror::Error;
use zeroize::Zeroizing;

/// Required key length in bytes (AES-256).
pub const KEY_LENGTH: usize = 32;

/// GCM nonce length in bytes (96 bits).
pub const NONCE_LENGTH: usize = 12;

/// Standard alphabet; padding is emitted on encode and optional on decode.
const BLOB_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Errors from sealing or unsealing.
///
/// `Authentication` carries no detail: a wrong key and a
/// tampered ciphertext are indistinguishable.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize { expected: usize, actual: usize },

    #[error("Sealed blob is not valid base64: {0}")]
    Decode(String),

    #[error("Sealed blob too short: {len} bytes")]
    ShortCiphertext { len: usize },

    #[error("decryption failed")]
    Authentication,

    #[error("Encryption failed")]
    Encryption,

    #[error("Random source unavailable: {0}")]
    Randomness(String),
}

impl CipherError {
    /// Short stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CipherError::InvalidKeySize { .. } => "invalid_key_size",
            CipherError::Decode(_) => "decode",
            CipherError::ShortCiphertext { .. } => "short_ciphertext",
            CipherError::Authentication => "authentication",
            CipherError::Encryption => "encryption",
            CipherError::Randomness(_) => "randomness",
        }
    }
}

fn check_key(key: &[u8]) -> Result<(), CipherError> {
    if key.len() != KEY_LENGTH {
        return Err(CipherError::InvalidKeySize {
            expected: KEY_LENGTH,
            actual: key.len(),
        });
    }
    Ok(())
}

/// Seal plaintext under `key`, returning the base64 sealed blob.
///
/// # Errors
///
/// Returns `CipherError::InvalidKeySize` if `key` is not exactly 32 bytes,
/// before any other work is done.
///
/// # Examples
///
/// ```
/// use disappr_core::crypto::{seal, unseal};
///
/// let key = [7u8; 32];
/// let blob = seal(b"hello", &key).unwrap();
/// assert_eq!(unseal(&blob, &key).unwrap().as_slice(), b"hello");
/// ```
pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<String, CipherError> {
    check_key(key)?;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| CipherError::Randomness(e.to_string()))?;

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeySize {
        expected: KEY_LENGTH,
        actual: key.len(),
    })?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CipherError::Encryption)?;

    let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(BLOB_ENGINE.encode(blob))
}

/// Unseal a base64 sealed blob produced by [`seal`].
///
/// # Errors
///
/// - `InvalidKeySize` if `key` is not 32 bytes (checked first)
/// - `Decode` if the text is not valid base64
/// - `ShortCiphertext` if the decoded blob is shorter than a nonce
/// - `Authentication` if the tag does not verify (tampering or wrong key)
pub fn unseal(sealed: &str, key: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    check_key(key)?;

    let blob = BLOB_ENGINE
        .decode(sealed.trim().as_bytes())
        .map_err(|e| CipherError::Decode(e.to_string()))?;
    if blob.len() < NONCE_LENGTH {
        return Err(CipherError::ShortCiphertext { len: blob.len() });
    }

    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKeySize {
        expected: KEY_LENGTH,
        actual: key.len(),
    })?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CipherError::Authentication)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};

    fn test_key() -> [u8; KEY_LENGTH] {
        let mut key = [0u8; KEY_LENGTH];
        getrandom::getrandom(&mut key).unwrap();
        key
    }

    #[test]
    fn test_seal_unseal_round_trip() {
        let key = test_key();
        let plaintext = b"Hello, World! This is secret data.";

        let sealed = seal(plaintext, &key).unwrap();
        let opened = unseal(&sealed, &key).unwrap();

        assert_eq!(opened.as_slice(), plaintext);
    }

    #[test]
    fn test_empty_plaintext_round_trip() {
        let key = test_key();
        let sealed = seal(b"", &key).unwrap();
        assert!(unseal(&sealed, &key).unwrap().is_empty());
    }

    #[test]
    fn test_blob_layout() {
        let key = test_key();
        let sealed = seal(b"abc", &key).unwrap();
        let raw = STANDARD.decode(&sealed).unwrap();
        // nonce + 3 bytes ciphertext + 16 byte tag
        assert_eq!(raw.len(), NONCE_LENGTH + 3 + 16);
    }

    #[test]
    fn test_unpadded_blob_accepted() {
        let key = test_key();
        let sealed = seal(b"padding check!", &key).unwrap();
        let raw = STANDARD.decode(&sealed).unwrap();
        let unpadded = STANDARD_NO_PAD.encode(raw);

        let opened = unseal(&unpadded, &key).unwrap();
        assert_eq!(opened.as_slice(), b"padding check!");
    }

    #[test]
    fn test_wrong_key_is_authentication_error() {
        let sealed = seal(b"secret", &test_key()).unwrap();
        let result = unseal(&sealed, &test_key());
        assert!(matches!(result, Err(CipherError::Authentication)));
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let result = unseal("!!!notbase64===", &test_key());
        assert!(matches!(result, Err(CipherError::Decode(_))));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let short = STANDARD.encode(b"123");
        let result = unseal(&short, &test_key());
        assert!(matches!(
            result,
            Err(CipherError::ShortCiphertext { len: 3 })
        ));
    }

    #[test]
    fn test_key_size_checked_before_decoding() {
        // Invalid base64 with a bad key must report the key problem first.
        let result = unseal("!!!notbase64===", &[0u8; 10]);
        assert!(matches!(
            result,
            Err(CipherError::InvalidKeySize {
                expected: 32,
                actual: 10
            })
        ));
    }

    #[test]
    fn test_authentication_display_is_generic() {
        assert_eq!(CipherError::Authentication.to_string(), "decryption failed");
    }
}
