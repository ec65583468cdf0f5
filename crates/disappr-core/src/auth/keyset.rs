//! Cached signing key set with periodic and on-demand refresh.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{Algorithm, DecodingKey};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Public keys for Firebase/Google secure-token ID tokens.
pub const DEFAULT_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Errors from fetching or installing a key set.
#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key set fetch failed: {0}")]
    Fetch(String),

    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("key set document is invalid: {0}")]
    Parse(String),

    #[error("key set contains no usable signing keys")]
    Empty,
}

/// A single public key and the algorithm tokens must use with it.
#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    pub algorithm: Algorithm,
}

/// Immutable snapshot of verification keys, keyed by `kid`.
#[derive(Clone, Default)]
pub struct SigningKeySet {
    keys: HashMap<String, VerificationKey>,
}

impl SigningKeySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from a JWKS document.
    ///
    /// Keys without a `kid`, symmetric keys and keys with unsupported
    /// algorithms are skipped.
    pub fn from_jwks(jwks: &JwkSet) -> Self {
        let mut keys = HashMap::new();
        for jwk in &jwks.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                debug!("Skipping JWK without kid");
                continue;
            };
            let Some(algorithm) = signing_algorithm(jwk) else {
                debug!(%kid, "Skipping JWK with unsupported algorithm");
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, VerificationKey { key, algorithm });
                }
                Err(e) => debug!(%kid, error = %e, "Skipping unusable JWK"),
            }
        }
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for SigningKeySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kids: Vec<&str> = self.key_ids().collect();
        kids.sort_unstable();
        f.debug_struct("SigningKeySet").field("kids", &kids).finish()
    }
}

/// Asymmetric signing algorithm for a JWK. HMAC keys are never accepted.
fn signing_algorithm(jwk: &Jwk) -> Option<Algorithm> {
    match jwk.common.key_algorithm {
        Some(KeyAlgorithm::RS256) => return Some(Algorithm::RS256),
        Some(KeyAlgorithm::RS384) => return Some(Algorithm::RS384),
        Some(KeyAlgorithm::RS512) => return Some(Algorithm::RS512),
        Some(KeyAlgorithm::PS256) => return Some(Algorithm::PS256),
        Some(KeyAlgorithm::PS384) => return Some(Algorithm::PS384),
        Some(KeyAlgorithm::PS512) => return Some(Algorithm::PS512),
        Some(KeyAlgorithm::ES256) => return Some(Algorithm::ES256),
        Some(KeyAlgorithm::ES384) => return Some(Algorithm::ES384),
        Some(KeyAlgorithm::EdDSA) => return Some(Algorithm::EdDSA),
        Some(_) => return None,
        None => {}
    }

    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Some(Algorithm::RS256),
        AlgorithmParameters::EllipticCurve(params) => match params.curve {
            EllipticCurve::P256 => Some(Algorithm::ES256),
            EllipticCurve::P384 => Some(Algorithm::ES384),
            _ => None,
        },
        AlgorithmParameters::OctetKeyPair(_) => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Where key set documents come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwkSet, KeySetError>;
}

/// Fetches a JWKS document over HTTPS.
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: String,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KeySetError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeySetError::Fetch(format!("failed to create client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| KeySetError::Fetch(e.to_string()))?;
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| KeySetError::Parse(e.to_string()))
    }
}

/// A fixed JWKS document, from a string or a local file.
#[derive(Clone)]
pub struct StaticKeySetSource {
    jwks: JwkSet,
}

impl StaticKeySetSource {
    pub fn new(jwks: JwkSet) -> Self {
        Self { jwks }
    }

    pub fn from_json(json: &str) -> Result<Self, KeySetError> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| KeySetError::Parse(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, KeySetError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KeySetError::Fetch(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

#[async_trait]
impl KeySetSource for StaticKeySetSource {
    async fn fetch(&self) -> Result<JwkSet, KeySetError> {
        Ok(self.jwks.clone())
    }
}

/// Refresh policy for [`KeySetProvider`].
#[derive(Debug, Clone, Copy)]
pub struct KeySetConfig {
    /// Period of the background refresh
    pub refresh_interval: Duration,
    /// Upper bound on a single fetch
    pub refresh_timeout: Duration,
    /// Minimum gap between a previous refresh and an unknown-`kid` refresh
    pub unknown_kid_cooldown: Duration,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60 * 60),
            refresh_timeout: Duration::from_secs(10),
            unknown_kid_cooldown: Duration::from_secs(30),
        }
    }
}

/// Holder of the current [`SigningKeySet`].
///
/// Readers call [`current`](Self::current) and never block. Refreshes are
/// serialised by `refresh_lock`, which also records when the last attempt
/// started; a failed refresh leaves the previous snapshot in place.
pub struct KeySetProvider {
    source: Arc<dyn KeySetSource>,
    current: ArcSwap<SigningKeySet>,
    refresh_lock: Mutex<Option<Instant>>,
    config: KeySetConfig,
}

impl KeySetProvider {
    /// Create a provider with an empty key set. Call [`refresh`](Self::refresh)
    /// before serving requests.
    pub fn new(source: Arc<dyn KeySetSource>, config: KeySetConfig) -> Self {
        Self {
            source,
            current: ArcSwap::from_pointee(SigningKeySet::empty()),
            refresh_lock: Mutex::new(None),
            config,
        }
    }

    /// Create a provider and populate it, failing if the first fetch fails.
    pub async fn initialize(
        source: Arc<dyn KeySetSource>,
        config: KeySetConfig,
    ) -> Result<Arc<Self>, KeySetError> {
        let provider = Arc::new(Self::new(source, config));
        let count = provider.refresh().await?;
        info!(keys = count, "Signing key set loaded");
        Ok(provider)
    }

    pub fn config(&self) -> &KeySetConfig {
        &self.config
    }

    /// Current snapshot.
    pub fn current(&self) -> Arc<SigningKeySet> {
        self.current.load_full()
    }

    /// Fetch and install a new snapshot, returning its key count.
    ///
    /// Waits for any refresh already in flight, then performs its own.
    pub async fn refresh(&self) -> Result<usize, KeySetError> {
        let mut last_attempt = self.refresh_lock.lock().await;
        self.refresh_locked(&mut last_attempt).await
    }

    async fn refresh_locked(&self, last_attempt: &mut Option<Instant>) -> Result<usize, KeySetError> {
        *last_attempt = Some(Instant::now());

        let jwks = tokio::time::timeout(self.config.refresh_timeout, self.source.fetch())
            .await
            .map_err(|_| KeySetError::Timeout(self.config.refresh_timeout))??;
        let set = SigningKeySet::from_jwks(&jwks);
        if set.is_empty() {
            return Err(KeySetError::Empty);
        }

        let count = set.len();
        self.current.store(Arc::new(set));
        Ok(count)
    }

    /// Refresh after a token named a `kid` we do not know.
    ///
    /// Coalesces with a refresh already in flight and honours
    /// `unknown_kid_cooldown`, so forged `kid` values cannot drive a fetch
    /// per request. Returns the snapshot to retry against.
    pub async fn refresh_for_unknown_kid(&self) -> Arc<SigningKeySet> {
        let seen = self.current();
        let mut last_attempt = self.refresh_lock.lock().await;

        let now = self.current();
        if !Arc::ptr_eq(&seen, &now) {
            return now;
        }
        if let Some(at) = *last_attempt {
            if at.elapsed() < self.config.unknown_kid_cooldown {
                return now;
            }
        }

        debug!("Refreshing key set for unknown kid");
        if let Err(e) = self.refresh_locked(&mut last_attempt).await {
            warn!(error = %e, "On-demand key set refresh failed");
        }
        self.current()
    }

    /// Spawn the periodic refresh task. Abort the handle to stop it.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        let period = provider.config.refresh_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match provider.refresh().await {
                    Ok(count) => debug!(keys = count, "Signing key set refreshed"),
                    Err(e) => {
                        warn!(error = %e, "Signing key set refresh failed; keeping last known keys")
                    }
                }
            }
        })
    }
}
