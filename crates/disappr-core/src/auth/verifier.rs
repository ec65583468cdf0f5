//! ID-token verification.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::keyset::KeySetProvider;
use super::{TokenError, TokenErrorKind};

/// Issuer host for Firebase/Google secure-token ID tokens.
pub const DEFAULT_ISSUER_HOST: &str = "securetoken.google.com";

/// Identity established from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub subject: String,
}

/// Anything that can turn a bearer token into an identity.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, TokenError>;
}

/// Expected audience and issuer for accepted tokens.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    pub project_id: String,
    pub issuer_host: String,
    /// Clock skew tolerance for `exp`, in seconds
    pub leeway_secs: u64,
}

impl VerifierConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            issuer_host: DEFAULT_ISSUER_HOST.to_string(),
            leeway_secs: 0,
        }
    }

    /// `https://<issuer_host>/<project_id>`
    pub fn expected_issuer(&self) -> String {
        format!("https://{}/{}", self.issuer_host, self.project_id)
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    aud: Option<Value>,
    #[serde(default)]
    iss: Option<Value>,
    #[serde(default)]
    sub: Option<Value>,
}

/// Verifies signed ID tokens against a [`KeySetProvider`].
pub struct TokenVerifier {
    keys: Arc<KeySetProvider>,
    config: VerifierConfig,
    expected_issuer: String,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeySetProvider>, config: VerifierConfig) -> Self {
        let expected_issuer = config.expected_issuer();
        Self {
            keys,
            config,
            expected_issuer,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify signature, expiry, audience, issuer and subject.
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedIdentity, TokenError> {
        let header = decode_header(token).map_err(map_jwt_error)?;
        let kid = header
            .kid
            .ok_or_else(|| TokenError::new(TokenErrorKind::Malformed, "token header has no kid"))?;

        let mut keys = self.keys.current();
        if keys.get(&kid).is_none() {
            keys = self.keys.refresh_for_unknown_kid().await;
        }
        let verification_key = keys.get(&kid).ok_or_else(|| {
            TokenError::new(
                TokenErrorKind::SignatureInvalid,
                format!("unknown signing key {}", kid),
            )
        })?;

        if header.alg != verification_key.algorithm {
            return Err(TokenError::new(
                TokenErrorKind::SignatureInvalid,
                format!(
                    "algorithm {:?} does not match key {}",
                    header.alg, kid
                ),
            ));
        }

        let mut validation = Validation::new(verification_key.algorithm);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = self.config.leeway_secs;

        let data = decode::<IdTokenClaims>(token, &verification_key.key, &validation)
            .map_err(map_jwt_error)?;
        self.check_claims(data.claims)
    }

    fn check_claims(&self, claims: IdTokenClaims) -> Result<AuthenticatedIdentity, TokenError> {
        match claims.aud.as_ref().and_then(Value::as_str) {
            Some(aud) if aud == self.config.project_id => {}
            _ => {
                return Err(TokenError::new(
                    TokenErrorKind::ClaimInvalid,
                    "audience does not match project",
                ))
            }
        }

        match claims.iss.as_ref().and_then(Value::as_str) {
            Some(iss) if iss == self.expected_issuer => {}
            _ => {
                return Err(TokenError::new(
                    TokenErrorKind::ClaimInvalid,
                    "issuer does not match project",
                ))
            }
        }

        match claims.sub {
            Some(Value::String(subject)) if !subject.is_empty() => {
                Ok(AuthenticatedIdentity { subject })
            }
            _ => Err(TokenError::new(
                TokenErrorKind::ClaimInvalid,
                "subject missing or empty",
            )),
        }
    }
}

#[async_trait]
impl Authenticator for TokenVerifier {
    async fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, TokenError> {
        self.verify(token).await.map_err(|err| {
            debug!(kind = ?err.kind(), detail = err.detail(), "Token rejected");
            err
        })
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> TokenError {
    let kind = match err.kind() {
        ErrorKind::ExpiredSignature => TokenErrorKind::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::RsaFailedSigning => TokenErrorKind::SignatureInvalid,
        ErrorKind::InvalidAudience
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::MissingRequiredClaim(_) => TokenErrorKind::ClaimInvalid,
        _ => TokenErrorKind::Malformed,
    };
    TokenError::new(kind, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_issuer() {
        let config = VerifierConfig::new("demo-project");
        assert_eq!(
            config.expected_issuer(),
            "https://securetoken.google.com/demo-project"
        );
    }

    #[test]
    fn test_map_jwt_error_kinds() {
        let expired = jsonwebtoken::errors::Error::from(ErrorKind::ExpiredSignature);
        assert_eq!(map_jwt_error(expired).kind(), TokenErrorKind::Expired);

        let forged = jsonwebtoken::errors::Error::from(ErrorKind::InvalidSignature);
        assert_eq!(map_jwt_error(forged).kind(), TokenErrorKind::SignatureInvalid);

        let garbage = jsonwebtoken::errors::Error::from(ErrorKind::InvalidToken);
        assert_eq!(map_jwt_error(garbage).kind(), TokenErrorKind::Malformed);
    }
}
