//! Builds collaborators from [`ServerConfig`] and runs the server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use disappr_core::auth::{
    HttpKeySetSource, KeySetProvider, KeySetSource, StaticKeySetSource, TokenVerifier,
};
use disappr_core::clock::{Clock, SystemClock};
use disappr_core::keys::{
    KeyProvider, KeyfileKeyProvider, KeyfileMode, SecretManagerConfig, SecretManagerKeyProvider,
    SecretString, StaticKeyProvider, DEFAULT_BASE_URL,
};
use disappr_core::storage::{MemoryNoteStore, NoteStore, SqliteNoteStore};
use disappr_core::NoteService;

use crate::app::{router, AppState};
use crate::config::{KeySource, ServerConfig, KEYFILE_PASSPHRASE_ENV_VAR};

/// Everything `serve` needs, built and checked up front.
pub struct Services {
    pub state: AppState,
    pub key_set: Arc<KeySetProvider>,
    pub store: Arc<dyn NoteStore>,
}

/// Build the store, key provider and verifier.
///
/// Fails if the content key or the signing key set cannot be obtained.
pub async fn build_services(config: &ServerConfig) -> anyhow::Result<Services> {
    let store = build_store(config)?;

    let keys = build_key_provider(config)?;
    keys.encryption_key()
        .await
        .map_err(|e| anyhow::anyhow!("Encryption key check failed: {}", e))?;

    let key_set = build_key_set(config).await?;
    let verifier = TokenVerifier::new(Arc::clone(&key_set), config.verifier_config());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let notes = NoteService::new(Arc::clone(&store), keys, Arc::new(verifier), clock)
        .with_burn_policy(config.notes.burn_policy);
    let state = AppState::new(
        notes,
        &config.server.public_base_url,
        config.request_timeout(),
    );

    Ok(Services {
        state,
        key_set,
        store,
    })
}

pub fn build_store(config: &ServerConfig) -> anyhow::Result<Arc<dyn NoteStore>> {
    if config.uses_memory_store() {
        warn!("Using in-memory note store; notes do not survive a restart");
        return Ok(Arc::new(MemoryNoteStore::new()));
    }

    let path = Path::new(&config.storage.path);
    let store = SqliteNoteStore::open(path).map_err(|e| {
        anyhow::anyhow!("Failed to open note database {}: {}", path.display(), e)
    })?;
    info!(path = %path.display(), "Note database opened");
    Ok(Arc::new(store))
}

pub fn build_key_provider(config: &ServerConfig) -> anyhow::Result<Arc<dyn KeyProvider>> {
    let keys = &config.keys;
    let provider: Arc<dyn KeyProvider> = match keys.source {
        KeySource::Env => Arc::new(StaticKeyProvider::from_env(&keys.env_var)?),
        KeySource::Keyfile => {
            let path = keys
                .keyfile_path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("keys.keyfile_path is not set"))?;
            let passphrase = match keys.keyfile_mode {
                KeyfileMode::Plain => None,
                KeyfileMode::Encrypted => Some(passphrase_from_env()?),
            };
            Arc::new(KeyfileKeyProvider::load(
                path,
                keys.keyfile_mode,
                passphrase.as_ref(),
            )?)
        }
        KeySource::SecretManager => {
            let project = keys
                .gcp_project
                .clone()
                .ok_or_else(|| anyhow::anyhow!("keys.gcp_project is not set"))?;
            let access_token = std::env::var(&keys.access_token_env)
                .ok()
                .filter(|token| !token.trim().is_empty())
                .map(SecretString::from);
            if access_token.is_none() {
                debug!(
                    env = %keys.access_token_env,
                    "No secret store access token; requests will be unauthenticated"
                );
            }
            Arc::new(SecretManagerKeyProvider::new(SecretManagerConfig {
                base_url: DEFAULT_BASE_URL.to_string(),
                project,
                secret_name: keys.secret_name.clone(),
                access_token,
                timeout: Duration::from_secs(keys.timeout_secs),
            })?)
        }
    };
    info!(source = ?keys.source, "Encryption key provider configured");
    Ok(provider)
}

pub async fn build_key_set(config: &ServerConfig) -> anyhow::Result<Arc<KeySetProvider>> {
    let key_set_config = config.key_set_config();
    let source: Arc<dyn KeySetSource> = match &config.auth.jwks_file {
        Some(path) => Arc::new(StaticKeySetSource::from_file(path)?),
        None => Arc::new(HttpKeySetSource::new(
            config.auth.jwks_url.clone(),
            key_set_config.refresh_timeout,
        )?),
    };

    KeySetProvider::initialize(source, key_set_config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load signing keys: {}", e))
}

/// Keyfile passphrase from the environment.
pub fn passphrase_from_env() -> anyhow::Result<SecretString> {
    let value = std::env::var(KEYFILE_PASSPHRASE_ENV_VAR)
        .map_err(|_| anyhow::anyhow!("{} is not set", KEYFILE_PASSPHRASE_ENV_VAR))?;
    if value.is_empty() {
        return Err(anyhow::anyhow!("{} is empty", KEYFILE_PASSPHRASE_ENV_VAR));
    }
    Ok(SecretString::from(value))
}

/// Periodically purge expired and consumed notes. `None` when disabled.
pub fn spawn_sweeper(store: Arc<dyn NoteStore>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }
    let period = Duration::from_secs(interval_secs);

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match store.purge_expired(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "Purged expired notes"),
                Err(e) => warn!(error = %e, "Note sweep failed"),
            }
        }
    }))
}

/// Bind, serve until Ctrl-C or SIGTERM, then stop background tasks.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    config.validate()?;
    let services = build_services(&config).await?;

    let refresh_task = services.key_set.spawn_refresh_task();
    let sweeper = spawn_sweeper(Arc::clone(&services.store), config.storage.sweep_interval_secs);
    let app = router(services.state, config.server.max_body_bytes);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", address, e))?;
    info!(address = %listener.local_addr()?, "Disappr listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    refresh_task.abort();
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    info!("Disappr stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    use disappr_core::crypto::EncryptionKey;
    use disappr_core::keys::write_keyfile;
    use disappr_core::storage::{Note, NotePatch};
    use uuid::Uuid;

    fn note(expires_in: chrono::Duration) -> Note {
        let now = chrono::Utc::now();
        Note {
            id: Uuid::new_v4(),
            sealed_content: "c2VhbGVk".to_string(),
            burn_after_read: true,
            expires_at: now + expires_in,
            consumed: false,
            owner_subject: "user-1".to_string(),
            created_at: now,
        }
    }

    fn config_with(source: KeySource) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth.project_id = Some("demo".to_string());
        config.keys.source = source;
        config
    }

    #[test]
    fn test_memory_store_selected_by_path() {
        let mut config = config_with(KeySource::Env);
        config.storage.path = ":memory:".to_string();
        assert!(build_store(&config).is_ok());
    }

    #[test]
    fn test_sqlite_store_created_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let mut config = config_with(KeySource::Env);
        config.storage.path = path.to_string_lossy().to_string();

        build_store(&config).expect("store should open");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_plain_keyfile_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("disappr.key");
        let key = EncryptionKey::generate().unwrap();
        write_keyfile(&path, &key, KeyfileMode::Plain, None).unwrap();

        let mut config = config_with(KeySource::Keyfile);
        config.keys.keyfile_path = Some(path);
        let provider = build_key_provider(&config).expect("provider should build");

        let loaded = provider.encryption_key().await.unwrap();
        assert_eq!(loaded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_missing_env_key_fails() {
        let mut config = config_with(KeySource::Env);
        config.keys.env_var = "DISAPPR_TEST_KEY_THAT_IS_NEVER_SET".to_string();
        assert!(build_key_provider(&config).is_err());
    }

    #[tokio::test]
    async fn test_sweeper_disabled_at_zero() {
        let store: Arc<dyn NoteStore> = Arc::new(MemoryNoteStore::new());
        assert!(spawn_sweeper(store, 0).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_on_interval() {
        let memory = MemoryNoteStore::new();
        let live = note(chrono::Duration::minutes(5));
        let expired = note(chrono::Duration::minutes(-5));
        let consumed = note(chrono::Duration::minutes(5));
        for n in [&live, &expired, &consumed] {
            memory.put(n).await.unwrap();
        }
        memory.update(&consumed.id, &NotePatch::consume()).await.unwrap();

        let store: Arc<dyn NoteStore> = Arc::new(memory.clone());
        let handle = spawn_sweeper(store, 60).expect("sweeper should start");
        tokio::time::sleep(Duration::from_secs(61)).await;
        handle.abort();

        assert_eq!(memory.len(), 1);
        assert!(memory.get(&live.id).await.unwrap().is_some());
        assert!(memory.get(&expired.id).await.unwrap().is_none());
        assert!(memory.get(&consumed.id).await.unwrap().is_none());
    }
}
