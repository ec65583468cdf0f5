//! Symmetric encryption key material.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use zeroize::Zeroizing;

use super::cipher::{CipherError, KEY_LENGTH};

/// The service-wide content encryption key.
///
/// Key bytes are zeroized from memory when dropped. The length is not
/// enforced here; the cipher rejects anything that is not 32 bytes so that
/// a misconfigured provider surfaces as `InvalidKeySize` at first use.
#[derive(Clone)]
pub struct EncryptionKey {
    key: Zeroizing<Vec<u8>>,
}

impl EncryptionKey {
    /// Wrap raw key bytes.
    ///
    /// # Security
    ///
    /// The caller is responsible for ensuring the bytes come from a secure source.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            key: Zeroizing::new(bytes),
        }
    }

    /// Decode a base64 (standard alphabet) key.
    pub fn from_base64(encoded: &str) -> Result<Self, base64::DecodeError> {
        let bytes = STANDARD.decode(encoded.trim().as_bytes())?;
        Ok(Self::from_bytes(bytes))
    }

    /// Generate a fresh random 32-byte key.
    pub fn generate() -> Result<Self, CipherError> {
        let mut bytes = vec![0u8; KEY_LENGTH];
        getrandom::getrandom(&mut bytes).map_err(|e| CipherError::Randomness(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Encode the key as base64 for keyfiles and secret payloads.
    pub fn to_base64(&self) -> Zeroizing<String> {
        Zeroizing::new(STANDARD.encode(self.key.as_slice()))
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate seal/unseal.
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_key_length() {
        let key = EncryptionKey::generate().unwrap();
        assert_eq!(key.len(), KEY_LENGTH);
    }

    #[test]
    fn test_base64_round_trip() {
        let key = EncryptionKey::generate().unwrap();
        let decoded = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), decoded.as_bytes());
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(EncryptionKey::from_base64("not base64 at all!").is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let key = EncryptionKey::from_bytes(vec![0xAB; KEY_LENGTH]);
        let debug_output = format!("{:?}", key);

        assert!(debug_output.contains("REDACTED"));
        let key_hex = hex::encode(&key.as_bytes()[..4]);
        assert!(!debug_output.contains(&key_hex));
    }
}
