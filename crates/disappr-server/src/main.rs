//! Disappr server binary.
//!
//! # Usage
//!
//! ```bash
//! # Generate a content key
//! export DISAPPR_ENCRYPTION_KEY="$(disappr keygen)"
//!
//! # Serve on $PORT (default 8080)
//! FIREBASE_PROJECT_ID=my-project disappr serve
//!
//! # Serve with a config file
//! disappr serve --config /etc/disappr/config.toml
//! ```

use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use disappr_core::crypto::EncryptionKey;
use disappr_core::keys::{write_keyfile, KeyfileMode};
use disappr_server::bootstrap::{passphrase_from_env, serve};
use disappr_server::cli::{Cli, Commands, KeygenArgs, ServeArgs};
use disappr_server::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Keygen(args) => run_keygen(args),
    }
}

async fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    config.apply_overrides(&args);

    tracing::info!(
        version = disappr_core::VERSION,
        project_id = config.auth.project_id.as_deref().unwrap_or(""),
        burn_policy = ?config.notes.burn_policy,
        "Disappr starting"
    );
    serve(config).await
}

fn run_keygen(args: KeygenArgs) -> anyhow::Result<()> {
    let key = EncryptionKey::generate()
        .map_err(|e| anyhow::anyhow!("Failed to generate key: {}", e))?;

    match args.keyfile {
        Some(path) => {
            let (mode, passphrase) = if args.encrypted {
                (KeyfileMode::Encrypted, Some(passphrase_from_env()?))
            } else {
                (KeyfileMode::Plain, None)
            };
            write_keyfile(&path, &key, mode, passphrase.as_ref())?;
            println!("Wrote keyfile {}", path.display());
        }
        None => println!("{}", key.to_base64().as_str()),
    }
    Ok(())
}
