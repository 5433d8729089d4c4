//! Mahjong Scorer - backend for a mahjong hand scoring quiz
//!
//! Users sign up and log in, administrators publish problems (hand
//! configurations), other users score them from 0 to 100 and the
//! result screen shows mean, standard deviation, the caller's T-score
//! and a histogram of all votes.
//!
//! Exit codes:
//!   0 - Clean shutdown
//!   1 - Startup or runtime error (config, database, bind failure, etc.)

mod analysis;
mod cli;
mod config;
mod models;
mod server;
mod store;

use anyhow::{Context, Result};
use cli::Args;
use config::{Backend, Config};
use std::sync::Arc;
use store::{MemoryStore, PgStore, Repository};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("Mahjong Scorer v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Server failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .mahjong-scorer.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", config::CONFIG_FILE);
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration, open the store and serve until shutdown.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let repo = open_store(&config).await?;

    if config.database.seed {
        store::seed_if_empty(repo.as_ref())
            .await
            .context("Failed to seed database")?;
    }

    server::serve(server::AppState::new(repo), &config.server).await
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

/// Open the configured repository.
async fn open_store(config: &Config) -> Result<Arc<dyn Repository>> {
    match config.database.backend {
        Backend::Memory => {
            warn!("Using in-memory store; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
        Backend::Postgres => {
            info!(
                "Connecting to PostgreSQL (pool size {})",
                config.database.max_connections
            );
            let options = config.database.connect_options()?;
            let store = PgStore::connect(options, config.database.max_connections).await?;
            Ok(Arc::new(store))
        }
    }
}
