use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use disappr_core::auth::{KeySetConfig, VerifierConfig, DEFAULT_ISSUER_HOST, DEFAULT_JWKS_URL};
use disappr_core::keys::KeyfileMode;
use disappr_core::BurnPolicy;

use crate::cli::ServeArgs;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DB_PATH: &str = "disappr.db";
pub const MEMORY_DB_PATH: &str = ":memory:";
pub const DEFAULT_KEY_ENV_VAR: &str = "DISAPPR_ENCRYPTION_KEY";
pub const KEYFILE_PASSPHRASE_ENV_VAR: &str = "DISAPPR_KEYFILE_PASSPHRASE";
pub const DEFAULT_ACCESS_TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub auth: AuthSection,
    pub storage: StorageSection,
    pub keys: KeysSection,
    pub notes: NotesSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
    pub port: u16,
    /// Prefix for returned view URLs; empty yields a relative path
    pub public_base_url: String,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            public_base_url: String::new(),
            request_timeout_secs: 15,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub project_id: Option<String>,
    pub issuer_host: String,
    pub jwks_url: String,
    /// Local JWKS document used instead of `jwks_url`
    pub jwks_file: Option<PathBuf>,
    pub refresh_interval_secs: u64,
    pub refresh_timeout_secs: u64,
    pub unknown_kid_cooldown_secs: u64,
    pub leeway_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            project_id: None,
            issuer_host: DEFAULT_ISSUER_HOST.to_string(),
            jwks_url: DEFAULT_JWKS_URL.to_string(),
            jwks_file: None,
            refresh_interval_secs: 60 * 60,
            refresh_timeout_secs: 10,
            unknown_kid_cooldown_secs: 30,
            leeway_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub path: String,
    /// Period of the expired-note sweeper; 0 disables it
    pub sweep_interval_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_DB_PATH.to_string(),
            sweep_interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    #[default]
    Env,
    Keyfile,
    SecretManager,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysSection {
    pub source: KeySource,
    pub env_var: String,
    pub keyfile_path: Option<PathBuf>,
    pub keyfile_mode: KeyfileMode,
    pub gcp_project: Option<String>,
    pub secret_name: String,
    pub access_token_env: String,
    pub timeout_secs: u64,
}

impl Default for KeysSection {
    fn default() -> Self {
        Self {
            source: KeySource::Env,
            env_var: DEFAULT_KEY_ENV_VAR.to_string(),
            keyfile_path: None,
            keyfile_mode: KeyfileMode::Plain,
            gcp_project: None,
            secret_name: disappr_core::keys::DEFAULT_SECRET_NAME.to_string(),
            access_token_env: DEFAULT_ACCESS_TOKEN_ENV_VAR.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesSection {
    pub burn_policy: BurnPolicy,
}

impl ServerConfig {
    /// Read `path` if given, otherwise start from defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => read_config(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line (and env-backed) overrides.
    pub fn apply_overrides(&mut self, args: &ServeArgs) {
        if let Some(bind) = &args.bind {
            self.server.bind = bind.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        if let Some(url) = &args.public_base_url {
            self.server.public_base_url = url.clone();
        }
        if let Some(project_id) = &args.project_id {
            self.auth.project_id = Some(project_id.clone());
        }
        if let Some(jwks_file) = &args.jwks_file {
            self.auth.jwks_file = Some(jwks_file.clone());
        }
        if let Some(path) = &args.db_path {
            self.storage.path = path.clone();
        }
        if let Some(source) = args.key_source {
            self.keys.source = source;
        }
        if let Some(path) = &args.keyfile {
            self.keys.keyfile_path = Some(path.clone());
        }
        if let Some(project) = &args.gcp_project {
            self.keys.gcp_project = Some(project.clone());
        }
        if let Some(policy) = args.burn_policy {
            self.notes.burn_policy = policy.into();
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match self.auth.project_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "auth.project_id is required (set FIREBASE_PROJECT_ID or --project-id)"
                ))
            }
        }
        if self.server.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!("server.request_timeout_secs must be positive"));
        }
        if self.auth.refresh_interval_secs == 0 || self.auth.refresh_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "auth.refresh_interval_secs and auth.refresh_timeout_secs must be positive"
            ));
        }
        match self.keys.source {
            KeySource::Keyfile if self.keys.keyfile_path.is_none() => Err(anyhow::anyhow!(
                "keys.keyfile_path is required when keys.source = \"keyfile\""
            )),
            KeySource::SecretManager
                if self
                    .keys
                    .gcp_project
                    .as_deref()
                    .map_or(true, |p| p.trim().is_empty()) =>
            {
                Err(anyhow::anyhow!(
                    "keys.gcp_project is required when keys.source = \"secret_manager\" (set GCP_PROJECT)"
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.storage.path == MEMORY_DB_PATH
    }

    pub fn verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            project_id: self.auth.project_id.clone().unwrap_or_default(),
            issuer_host: self.auth.issuer_host.clone(),
            leeway_secs: self.auth.leeway_secs,
        }
    }

    pub fn key_set_config(&self) -> KeySetConfig {
        KeySetConfig {
            refresh_interval: Duration::from_secs(self.auth.refresh_interval_secs),
            refresh_timeout: Duration::from_secs(self.auth.refresh_timeout_secs),
            unknown_kid_cooldown: Duration::from_secs(self.auth.unknown_kid_cooldown_secs),
        }
    }
}

pub fn read_config(path: &Path) -> anyhow::Result<ServerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}
