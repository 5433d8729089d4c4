//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.mahjong-scorer.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".mahjong-scorer.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage settings.
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// How long browsers may cache a CORS preflight.
    #[serde(default = "default_cors_max_age")]
    pub cors_max_age_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_max_age_seconds: default_cors_max_age(),
        }
    }
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_max_age() -> u64 {
    3600
}

/// Which repository implementation to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// PostgreSQL via `database.url` or the discrete connection fields
    #[default]
    Postgres,
    /// Process memory; data is lost on exit
    Memory,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Full connection URL. When empty, one is built from the fields below.
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_db_name")]
    pub name: String,

    /// Pool size.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Insert a sample problem into an empty store on startup.
    #[serde(default = "default_true")]
    pub seed: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            url: String::new(),
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            name: default_db_name(),
            max_connections: default_max_connections(),
            seed: true,
        }
    }
}

impl DatabaseConfig {
    /// Connection options, parsed from `url` when set, otherwise assembled
    /// from the discrete fields so credentials never pass through a URL.
    pub fn connect_options(&self) -> Result<PgConnectOptions> {
        if !self.url.is_empty() {
            return self
                .url
                .parse::<PgConnectOptions>()
                .context("Invalid database URL");
        }

        let mut options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.name)
            .ssl_mode(PgSslMode::Disable);

        if !self.password.is_empty() {
            options = options.password(&self.password);
        }

        Ok(options)
    }
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_name() -> String {
    "mahjong".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_optional(Path::new(CONFIG_FILE))
    }

    fn load_optional(path: &Path) -> Result<Option<Self>> {
        if path.exists() {
            Ok(Some(Self::load(path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments only override the file when they were given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref host) = args.host {
            self.server.host = host.clone();
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(ref url) = args.database_url {
            self.database.url = url.clone();
        }
        if let Some(backend) = args.backend {
            self.database.backend = backend;
        }
        if args.in_memory {
            self.database.backend = Backend::Memory;
        }
        if args.no_seed {
            self.database.seed = false;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
