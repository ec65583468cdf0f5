//! Cryptographic operations for Disappr.
//!
//! Note content is sealed with AES-256-GCM under a single service-wide key:
//! - **Cipher**: `seal`/`unseal` of note content into a base64 sealed blob
//! - **EncryptionKey**: key material that is zeroized on drop
//!
//! ## Security Model
//!
//! - A fresh 96-bit random nonce for every seal
//! - Blob layout is `nonce || ciphertext || tag`, base64 encoded
//! - Every unseal failure renders as the same "decryption failed" text;
//!   distinct kinds exist only for logging
//! - Key material, plaintext and nonces are never logged
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft or inspection of the note store
//! - Tampering with stored ciphertext
//!
//! We do NOT defend against:
//! - Compromise of the key provider
//! - Access to process memory

pub mod cipher;
pub mod key;

pub use cipher::{seal, unseal, CipherError, KEY_LENGTH, NONCE_LENGTH};
pub use key::EncryptionKey;
