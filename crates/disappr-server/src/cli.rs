use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use disappr_core::{BurnPolicy, VERSION};

use crate::config::KeySource;

/// Disappr - ephemeral, encrypted note sharing
#[derive(Parser)]
#[command(name = "disappr")]
#[command(author, version = VERSION, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments for the `serve` command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Path to a TOML config file
    #[arg(short, long, env = "DISAPPR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    pub bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Prefix for returned view URLs
    #[arg(long, env = "DISAPPR_PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Expected token audience (project id)
    #[arg(long, env = "FIREBASE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Local JWKS document used instead of fetching signing keys
    #[arg(long)]
    pub jwks_file: Option<PathBuf>,

    /// SQLite database path, or ":memory:"
    #[arg(long, env = "DISAPPR_DB_PATH")]
    pub db_path: Option<String>,

    /// Where the content encryption key comes from
    #[arg(long, value_enum)]
    pub key_source: Option<KeySource>,

    /// Keyfile path (with --key-source keyfile)
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Secret store project (with --key-source secret-manager)
    #[arg(long, env = "GCP_PROJECT")]
    pub gcp_project: Option<String>,

    /// Behaviour when marking a burn-after-read note consumed fails
    #[arg(long, value_enum)]
    pub burn_policy: Option<BurnPolicyArg>,
}

/// Arguments for the `keygen` command
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the key to this file instead of printing it
    #[arg(long, value_name = "PATH")]
    pub keyfile: Option<PathBuf>,

    /// Encrypt the keyfile with the passphrase in DISAPPR_KEYFILE_PASSPHRASE
    #[arg(long, requires = "keyfile")]
    pub encrypted: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),

    /// Generate a new content encryption key
    Keygen(KeygenArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BurnPolicyArg {
    BestEffort,
    Strict,
}

impl From<BurnPolicyArg> for BurnPolicy {
    fn from(arg: BurnPolicyArg) -> Self {
        match arg {
            BurnPolicyArg::BestEffort => BurnPolicy::BestEffort,
            BurnPolicyArg::Strict => BurnPolicy::Strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_encrypted_requires_keyfile() {
        assert!(Cli::try_parse_from(["disappr", "keygen", "--encrypted"]).is_err());
        assert!(
            Cli::try_parse_from(["disappr", "keygen", "--encrypted", "--keyfile", "k"]).is_ok()
        );
    }

    #[test]
    fn test_key_source_values() {
        let cli = Cli::try_parse_from(["disappr", "serve", "--key-source", "secret-manager"])
            .expect("args should parse");
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.key_source, Some(KeySource::SecretManager)),
            _ => panic!("expected serve"),
        }
    }
}
