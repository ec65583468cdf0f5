//! Error types for note lifecycle operations.
//!
//! Errors are descriptive at the core level so they can be logged with full
//! context. The HTTP layer only ever sees the coarse [`ErrorCategory`] and
//! maps it to a status code and a fixed message.

use thiserror::Error;

use crate::auth::TokenError;
use crate::crypto::CipherError;
use crate::keys::KeyError;
use crate::storage::StoreError;

/// Result type alias for note lifecycle operations.
pub type Result<T> = std::result::Result<T, NoteError>;

/// Coarse error taxonomy exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad JSON, oversized body, missing parameters
    InvalidInput,
    /// Missing, invalid or expired bearer token
    Unauthorized,
    /// Unknown note identifier
    NotFound,
    /// Note expired or already consumed
    Gone,
    /// Key, store, crypto or decode failures
    Internal,
}

/// Why a note can no longer be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    Expired,
    Consumed,
}

/// Core error type for note lifecycle operations.
#[derive(Debug, Error)]
pub enum NoteError {
    /// Content exceeds the fixed size ceiling
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Bearer token rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(#[source] TokenError),

    /// Encryption key could not be obtained
    #[error("Encryption key unavailable: {0}")]
    KeyUnavailable(#[from] KeyError),

    /// Sealing content failed
    #[error("Encryption failed: {0}")]
    Encryption(#[source] CipherError),

    /// Stored content failed to unseal (integrity fault)
    #[error("Decryption failed")]
    Decryption(#[source] CipherError),

    /// Unsealed content is not valid text
    #[error("Stored content is corrupted: {0}")]
    Corrupted(String),

    /// Store read or write failed
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Note was never created (or has been removed by the store)
    #[error("Note not found")]
    NotFound,

    /// Note expired or already consumed
    #[error("Note is gone ({0:?})")]
    Gone(GoneReason),

    /// The request deadline elapsed before the operation completed
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl NoteError {
    /// Coarse category for the HTTP boundary.
    pub fn category(&self) -> ErrorCategory {
        match self {
            NoteError::PayloadTooLarge { .. } | NoteError::InvalidInput(_) => {
                ErrorCategory::InvalidInput
            }
            NoteError::Unauthorized(_) => ErrorCategory::Unauthorized,
            NoteError::NotFound => ErrorCategory::NotFound,
            NoteError::Gone(_) => ErrorCategory::Gone,
            NoteError::KeyUnavailable(_)
            | NoteError::Encryption(_)
            | NoteError::Decryption(_)
            | NoteError::Corrupted(_)
            | NoteError::Storage(_)
            | NoteError::DeadlineExceeded => ErrorCategory::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            NoteError::PayloadTooLarge { size: 2, max: 1 }.category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(NoteError::NotFound.category(), ErrorCategory::NotFound);
        assert_eq!(
            NoteError::Gone(GoneReason::Consumed).category(),
            ErrorCategory::Gone
        );
        assert_eq!(
            NoteError::Decryption(CipherError::Authentication).category(),
            ErrorCategory::Internal
        );
        assert_eq!(
            NoteError::DeadlineExceeded.category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_decryption_display_is_uniform() {
        let tampered = NoteError::Decryption(CipherError::Authentication);
        let short = NoteError::Decryption(CipherError::ShortCiphertext { len: 3 });
        assert_eq!(tampered.to_string(), short.to_string());
    }
}
