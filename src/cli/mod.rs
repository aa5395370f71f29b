//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for dbanon using clap.

pub mod commands;

use crate::config::{DbAnonConfig, LoggingConfig};
use clap::{Parser, Subcommand};

/// DbAnon - anonymized snapshots of PostgreSQL databases
#[derive(Parser, Debug)]
#[command(name = "dbanon")]
#[command(version, about, long_about = None)]
#[command(author = "DbAnon Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "dbanon.toml", env = "DBANON_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DBANON_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export, anonymize and re-export the configured database
    Anonymize(commands::anonymize::AnonymizeArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Cli {
    /// Whether this invocation must not create or delete any file
    pub fn is_dry_run(&self, config: Option<&DbAnonConfig>) -> bool {
        let flag = matches!(&self.command, Commands::Anonymize(args) if args.dry_run);
        flag || config.is_some_and(DbAnonConfig::dry_run)
    }

    /// Logging settings for this invocation
    ///
    /// The rolling log file is only written when a configuration file was
    /// loaded and the run is not a dry run.
    pub fn logging_config(&self, config: Option<&DbAnonConfig>) -> LoggingConfig {
        let mut logging = config.map(|c| c.logging.clone()).unwrap_or_default();
        if config.is_none() || self.is_dry_run(config) {
            logging.local_enabled = false;
        }
        logging
    }

    /// Log level: `--log-level`, then `application.log_level`, then `info`
    pub fn log_level(&self, config: Option<&DbAnonConfig>) -> String {
        self.log_level
            .clone()
            .or_else(|| config.map(|c| c.application.log_level.clone()))
            .unwrap_or_else(|| "info".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PipelineMode;

    #[test]
    fn test_cli_parse_anonymize() {
        let cli = Cli::parse_from(["dbanon", "anonymize"]);
        assert_eq!(cli.config, "dbanon.toml");
        assert!(matches!(cli.command, Commands::Anonymize(_)));
    }

    #[test]
    fn test_cli_parse_anonymize_flags() {
        let cli = Cli::parse_from([
            "dbanon",
            "anonymize",
            "--dry-run",
            "--yes",
            "--mode",
            "in-place-with-restore",
            "--output-dir",
            "/tmp/out",
        ]);
        let Commands::Anonymize(args) = cli.command else {
            panic!("expected anonymize");
        };
        assert!(args.dry_run);
        assert!(args.yes);
        assert_eq!(args.mode, Some(PipelineMode::InPlaceWithRestore));
        assert_eq!(args.output_dir.unwrap().to_str(), Some("/tmp/out"));
    }

    #[test]
    fn test_cli_rejects_unknown_mode() {
        let result = Cli::try_parse_from(["dbanon", "anonymize", "--mode", "sideways"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["dbanon", "--config", "custom.toml", "anonymize"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["dbanon", "--log-level", "debug", "validate-config"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["dbanon", "init", "--force"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }

    fn file_config() -> DbAnonConfig {
        let mut config = DbAnonConfig::default();
        config.database.name = "wordpress".to_string();
        config
    }

    #[test]
    fn test_dry_run_flag_disables_log_file() {
        let config = file_config();
        assert!(config.logging.local_enabled);

        let cli = Cli::parse_from(["dbanon", "anonymize", "--dry-run"]);
        assert!(cli.is_dry_run(Some(&config)));
        assert!(!cli.logging_config(Some(&config)).local_enabled);
    }

    #[test]
    fn test_dry_run_setting_disables_log_file() {
        let mut config = file_config();
        config.application.dry_run = true;

        let cli = Cli::parse_from(["dbanon", "anonymize"]);
        assert!(!cli.logging_config(Some(&config)).local_enabled);
    }

    #[test]
    fn test_normal_run_keeps_log_file() {
        let config = file_config();
        let cli = Cli::parse_from(["dbanon", "anonymize"]);
        assert!(!cli.is_dry_run(Some(&config)));
        assert!(cli.logging_config(Some(&config)).local_enabled);
        assert!(!cli.logging_config(None).local_enabled);
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = file_config();
        config.application.log_level = "warn".to_string();

        let cli = Cli::parse_from(["dbanon", "validate-config"]);
        assert_eq!(cli.log_level(Some(&config)), "warn");
        assert_eq!(cli.log_level(None), "info");

        let cli = Cli::parse_from(["dbanon", "--log-level", "debug", "validate-config"]);
        assert_eq!(cli.log_level(Some(&config)), "debug");
    }
}
