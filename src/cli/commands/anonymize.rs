//! Anonymize command implementation
//!
//! This module implements the `anonymize` command, which runs the full
//! pipeline against the configured PostgreSQL server.

use crate::adapters::database::create_postgres_capabilities;
use crate::anonymization::FakeGenerator;
use crate::config::load_config_unvalidated;
use crate::config::schema::{DbAnonConfig, PipelineMode};
use crate::core::PipelineOrchestrator;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Arguments for the anonymize command
#[derive(Args, Debug)]
pub struct AnonymizeArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Plan the run without writing to any database or file
    #[arg(long)]
    pub dry_run: bool,

    /// Override the pipeline mode (isolated-copy or in-place-with-restore)
    #[arg(long)]
    pub mode: Option<PipelineMode>,

    /// Override the directory receiving the dumps
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

impl AnonymizeArgs {
    /// Apply CLI overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut DbAnonConfig) {
        if let Some(mode) = self.mode {
            tracing::info!(mode = %mode, "Overriding pipeline mode from CLI");
            config.pipeline.mode = mode;
        }
        if let Some(dir) = &self.output_dir {
            tracing::info!(output_dir = %dir.display(), "Overriding output directory from CLI");
            config.pipeline.output_dir = dir.clone();
        }
        if self.dry_run {
            tracing::info!("Enabling dry-run mode from CLI");
            config.application.dry_run = true;
        }
    }

    /// Execute the anonymize command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting anonymize command");

        let mut config = match load_config_unvalidated(config_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                return Ok(e.exit_code());
            }
        };
        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        if config.dry_run() {
            println!("DRY RUN MODE - nothing will be written");
            println!();
        }

        // Confirmation prompt (unless --yes or dry-run)
        if !self.yes && !config.dry_run() {
            println!("Anonymization Configuration:");
            println!(
                "  Database: {} on {}:{}",
                config.database.name, config.database.host, config.database.port
            );
            println!("  Mode: {}", config.pipeline.mode);
            println!("  Output directory: {}", config.pipeline.output_dir.display());
            if config.pipeline.mode == PipelineMode::InPlaceWithRestore {
                println!("  WARNING: the source database is modified and restored afterwards");
            }
            println!();
            print!("Proceed with anonymization? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Anonymization cancelled.");
                return Ok(0);
            }
        }

        let capabilities = match create_postgres_capabilities(&config) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to initialize database backend");
                eprintln!("Failed to initialize database backend: {e}");
                return Ok(4);
            }
        };

        let orchestrator = PipelineOrchestrator::new(
            config,
            capabilities,
            Arc::new(FakeGenerator::new()),
            shutdown_signal,
        );

        match orchestrator.run().await {
            Ok(summary) => {
                println!();
                print!("{}", summary.format_console());
                Ok(0)
            }
            Err(e) => {
                eprintln!();
                eprintln!("Anonymization failed: {e}");
                if e.requires_manual_recovery() {
                    eprintln!("The source database may contain anonymized data.");
                    eprintln!("Restore it manually from the backup named above.");
                }
                Ok(e.exit_code())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> AnonymizeArgs {
        AnonymizeArgs {
            yes: true,
            dry_run: false,
            mode: None,
            output_dir: None,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let mut config = DbAnonConfig::default();
        let args = AnonymizeArgs {
            dry_run: true,
            mode: Some(PipelineMode::InPlaceWithRestore),
            output_dir: Some(PathBuf::from("/tmp/dumps")),
            ..args()
        };

        args.apply_overrides(&mut config);

        assert!(config.dry_run());
        assert_eq!(config.pipeline.mode, PipelineMode::InPlaceWithRestore);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("/tmp/dumps"));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = DbAnonConfig::default();
        config.application.dry_run = true;
        args().apply_overrides(&mut config);
        assert!(config.dry_run());
        assert_eq!(config.pipeline.mode, PipelineMode::IsolatedCopy);
    }

    #[tokio::test]
    async fn test_missing_config_is_configuration_error() {
        let (_tx, rx) = watch::channel(false);
        let code = args()
            .execute("/nonexistent/dbanon.toml", rx)
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
