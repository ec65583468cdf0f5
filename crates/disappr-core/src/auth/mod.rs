//! Bearer-token authentication.
//!
//! - **keyset**: the process-wide cache of public verification keys, swapped
//!   atomically on refresh and read without locking
//! - **verifier**: signature and claim validation producing an
//!   [`AuthenticatedIdentity`]
//!
//! Every rejection surfaces as the same [`TokenError`] text; the
//! [`TokenErrorKind`] exists for logs only.

mod keyset;
mod verifier;

use thiserror::Error;

pub use keyset::{
    HttpKeySetSource, KeySetConfig, KeySetError, KeySetProvider, KeySetSource, SigningKeySet,
    StaticKeySetSource, VerificationKey, DEFAULT_JWKS_URL,
};
pub use verifier::{
    AuthenticatedIdentity, Authenticator, TokenVerifier, VerifierConfig, DEFAULT_ISSUER_HOST,
};

/// Internal reason a token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenErrorKind {
    /// Not a structurally valid token
    Malformed,
    /// Unknown key id, wrong algorithm, or signature mismatch
    SignatureInvalid,
    /// Audience, issuer or subject claim missing or wrong
    ClaimInvalid,
    /// Expiry claim is in the past
    Expired,
}

/// Token rejection. Displays identically for every kind.
#[derive(Debug, Error)]
#[error("invalid token")]
pub struct TokenError {
    kind: TokenErrorKind,
    detail: String,
}

impl TokenError {
    pub fn new(kind: TokenErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> TokenErrorKind {
        self.kind
    }

    /// Diagnostic detail for logs. Never return this to a caller.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_hides_kind() {
        let expired = TokenError::new(TokenErrorKind::Expired, "exp in the past");
        let forged = TokenError::new(TokenErrorKind::SignatureInvalid, "bad signature");
        assert_eq!(expired.to_string(), forged.to_string());
        assert_eq!(expired.kind(), TokenErrorKind::Expired);
        assert_eq!(forged.detail(), "bad signature");
    }
}
