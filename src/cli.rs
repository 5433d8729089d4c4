//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

use crate::config::Backend;

/// Mahjong Scorer - backend for a mahjong hand scoring quiz
///
/// Serves problems, records votes and returns per-problem statistics
/// (mean, standard deviation, T-score, histogram) over HTTP.
///
/// Examples:
///   mahjong-scorer
///   mahjong-scorer --port 9000 --database-url postgres://user:pw@localhost/mahjong
///   mahjong-scorer --in-memory --verbose
///   mahjong-scorer --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .mahjong-scorer.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, value_name = "HOST", env = "SCORER_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT", env = "SCORER_PORT")]
    pub port: Option<u16>,

    /// PostgreSQL connection URL
    #[arg(long, value_name = "URL", env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Storage backend (postgres, memory)
    #[arg(long, value_name = "BACKEND")]
    pub backend: Option<Backend>,

    /// Keep all data in memory (shorthand for --backend memory)
    #[arg(long, conflicts_with = "backend")]
    pub in_memory: bool,

    /// Do not insert the sample problem into an empty store
    #[arg(long)]
    pub no_seed: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .mahjong-scorer.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.port == Some(0) {
            return Err("Port must be between 1 and 65535".to_string());
        }

        if let Some(ref url) = self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(
                    "Database URL must start with 'postgres://' or 'postgresql://'".to_string(),
                );
            }
        }

        if let Some(ref path) = self.config {
            if !path.is_file() {
                return Err(format!("Config file does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            config: None,
            host: None,
            port: None,
            database_url: None,
            backend: None,
            in_memory: false,
            no_seed: false,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(make_args().validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_database_url() {
        let mut args = make_args();
        args.database_url = Some("mysql://localhost/db".to_string());
        assert!(args.validate().is_err());

        args.database_url = Some("postgres://localhost/db".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_port_and_config() {
        let mut args = make_args();
        args.port = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.config = Some(PathBuf::from("/definitely/not/here.toml"));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_parse_flags() {
        let args = Args::parse_from([
            "mahjong-scorer",
            "--port",
            "9000",
            "--in-memory",
            "--no-seed",
        ]);
        assert_eq!(args.port, Some(9000));
        assert!(args.in_memory);
        assert!(args.no_seed);
    }

    #[test]
    fn test_merge_with_config() {
        let args = Args::parse_from(["mahjong-scorer", "--backend", "memory", "--port", "7000"]);
        let mut config = crate::config::Config::default();
        config.merge_with_args(&args);

        assert_eq!(config.database.backend, Backend::Memory);
        assert_eq!(config.server.port, 7000);
        assert_eq!(config.server.host, "0.0.0.0");
    }
}
