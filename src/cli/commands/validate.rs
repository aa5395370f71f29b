//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the dbanon configuration file.

use crate::config::load_config_unvalidated;
use crate::config::schema::DbAnonConfig;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config_unvalidated(config_path) {
            Ok(c) => {
                println!("Configuration file loaded successfully");
                c
            }
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2); // Configuration error exit code
            }
        };

        match config.validate() {
            Ok(()) => {
                println!("Configuration is valid");
                println!();
                print!("{}", describe(&config));
                Ok(0)
            }
            Err(e) => {
                println!("Configuration validation failed");
                println!("   Error: {e}");
                println!();
                Ok(2)
            }
        }
    }
}

/// Human-readable configuration summary; the password is never shown
fn describe(config: &DbAnonConfig) -> String {
    let identity_fields: Vec<&str> = config
        .anonymization
        .identity_fields
        .iter()
        .map(|r| r.field.as_str())
        .collect();
    let attribute_keys: Vec<&str> = config
        .anonymization
        .attribute_keys
        .iter()
        .map(|r| r.field.as_str())
        .collect();

    let mut lines = vec![
        "Configuration Summary:".to_string(),
        format!("  Log Level: {}", config.application.log_level),
        format!(
            "  Database: {}@{}:{}/{}",
            config.database.user, config.database.host, config.database.port, config.database.name
        ),
        format!("  Mode: {}", config.pipeline.mode),
        format!("  Output Directory: {}", config.pipeline.output_dir.display()),
        format!("  Batch Size: {}", config.pipeline.batch_size),
        format!("  Parallel Scopes: {}", config.pipeline.max_parallel_scopes),
        format!(
            "  Tools: {} / {}",
            config.tools.dump_command, config.tools.import_command
        ),
        format!(
            "  Tables: {p}{} / {p}{}",
            config.schema.identity_table,
            config.schema.attribute_table,
            p = config.schema.table_prefix
        ),
        format!("  Tenancy: {:?}", config.schema.tenancy),
        format!("  Protected IDs: {:?}", config.anonymization.protected_ids),
        format!("  Identity Fields: {}", identity_fields.join(", ")),
        format!("  Attribute Keys: {}", attribute_keys.join(", ")),
    ];
    if config.anonymization.audit.enabled {
        lines.push(format!(
            "  Audit Log: {}",
            config.anonymization.audit.log_path.display()
        ));
    }
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use tempfile::tempdir;

    #[test]
    fn test_describe_hides_password() {
        let mut config = DbAnonConfig::default();
        config.database.name = "wordpress".to_string();
        config.database.password = secret_string("hunter2".to_string());

        let text = describe(&config);
        assert!(text.contains("postgres@localhost:5432/wordpress"));
        assert!(text.contains("Tables: wp_users / wp_usermeta"));
        assert!(!text.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_valid_file_exits_zero() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dbanon.toml");
        std::fs::write(&path, "[database]\nname = \"wordpress\"\n").unwrap();

        let code = ValidateArgs {}
            .execute(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_file_exits_two() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dbanon.toml");
        std::fs::write(&path, "[pipeline]\nbatch_size = 0\n").unwrap();

        let code = ValidateArgs {}
            .execute(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }
}
