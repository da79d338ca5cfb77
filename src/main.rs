mod auth;
mod browse;
mod config;
mod error;
mod favorites;
mod listings;
mod models;
mod session;
mod shell;
mod store;

use anyhow::Context;
use clap::Parser;
use config::ClientConfig;
use shell::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use store::{DocumentStore, FirebaseStore, MemoryStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Housing rental marketplace client
#[derive(Parser, Debug)]
#[command(name = "logement-client", version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Realtime Database URL (overrides config and environment)
    #[arg(long)]
    database_url: Option<String>,

    /// JSON export to seed the in-memory store when no database is configured
    #[arg(long)]
    seed: Option<PathBuf>,
}

async fn open_store(config: &ClientConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if config.database_url.is_some() {
        return Ok(Arc::new(FirebaseStore::from_config(config)?));
    }
    match &config.seed_file {
        Some(path) => Ok(Arc::new(MemoryStore::from_file(path).await?)),
        None => {
            warn!("No database configured, using an empty in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)?,
        None => ClientConfig::default(),
    };
    config.merge_with_env()?;
    if let Some(url) = cli.database_url {
        config.database_url = Some(url);
    }
    if let Some(seed) = cli.seed {
        config.seed_file = Some(seed);
    }
    config.validate().context("Invalid configuration")?;

    info!("🏠 Logement client");
    let store = open_store(&config).await?;

    let mut shell = Shell::new(store, config.write_retries, &config.placeholder_photo);
    shell.run().await?;

    info!("Au revoir !");
    Ok(())
}
