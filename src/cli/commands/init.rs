//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "dbanon.toml")]
    pub output: String,

    /// Include every option with comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("Initializing dbanon configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2); // Configuration error exit code
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Put DBANON_DATABASE_PASSWORD in a .env file or the environment");
                println!("  3. Validate configuration: dbanon validate-config");
                println!("  4. Preview the run: dbanon anonymize --dry-run");
                println!("  5. Run it: dbanon anonymize");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5) // Fatal error exit code
            }
        }
    }

    /// Generate minimal configuration
    fn generate_minimal_config() -> String {
        r#"# dbanon configuration

[application]
log_level = "info"
dry_run = false

[database]
host = "localhost"
port = 5432
user = "postgres"
password = "${DBANON_DATABASE_PASSWORD}"
name = "wordpress"

[pipeline]
mode = "isolated-copy"
output_dir = "."

[schema]
table_prefix = "wp_"
tenancy = "auto"

[anonymization]
protected_ids = [1]

[logging]
local_enabled = true
local_path = "./logs"
local_rotation = "daily"
"#
        .to_string()
    }

    /// Generate configuration with examples and comments
    fn generate_config_with_examples() -> String {
        r#"# dbanon configuration
#
# Every value can be overridden with DBANON_<SECTION>_<KEY>, for example
# DBANON_DATABASE_HOST or DBANON_PIPELINE_MODE. ${VAR} placeholders are
# replaced from the environment when the file is loaded.

# ============================================================================
# Application Settings
# ============================================================================
[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# Plan the run without touching any database or file
dry_run = false

# ============================================================================
# Source Database
# ============================================================================
[database]
host = "localhost"
port = 5432
user = "postgres"
# Passed to pg_dump/psql through PGPASSWORD, never on the command line
password = "${DBANON_DATABASE_PASSWORD}"
# Database to anonymize: letters, digits, "_" and "-" (not first), max 63
name = "wordpress"
# Maintenance database used to CREATE/DROP the working copy
admin_database = "postgres"
max_connections = 8
connection_timeout_seconds = 30
statement_timeout_seconds = 60

# ============================================================================
# Pipeline
# ============================================================================
[pipeline]
# isolated-copy: anonymize a temporary <name>_temp_<timestamp> database
# in-place-with-restore: anonymize the source, then restore it from the dump
mode = "isolated-copy"

# Receives <name>.sql and <name>_anonymized.sql
output_dir = "."

# Rows per page when walking the identity table
batch_size = 500

# Tenant scopes anonymized concurrently
max_parallel_scopes = 4

# Upper bound for one pg_dump or psql invocation
command_timeout_seconds = 3600

# Keep <name>.sql after an isolated-copy run
keep_source_dump = false

# ============================================================================
# External Tools
# ============================================================================
[tools]
dump_command = "pg_dump"
import_command = "psql"

# ============================================================================
# Table Layout
# ============================================================================
[schema]
table_prefix = "wp_"
identity_table = "users"
identity_key = "ID"
attribute_table = "usermeta"
attribute_owner_column = "user_id"
attribute_key_column = "meta_key"
attribute_value_column = "meta_value"

# single | multi | auto (multi when <prefix>blogs exists)
tenancy = "auto"
tenant_registry_table = "blogs"
tenant_id_column = "blog_id"
# Tenant whose tables use the bare prefix
main_tenant_id = 1

# ============================================================================
# Anonymization Rules
# ============================================================================
[anonymization]
# Identity keys that are never touched
protected_ids = [1]
# Attempts before a unique field gives up
max_unique_attempts = 100

# Generators: username, safe_email, name, first_name, last_name, sentence
[[anonymization.identity_fields]]
column = "user_login"
generator = "username"
unique = true

[[anonymization.identity_fields]]
column = "user_nicename"
generator = "username"
unique = true

[[anonymization.identity_fields]]
column = "user_email"
generator = "safe_email"
unique = true

[[anonymization.identity_fields]]
column = "display_name"
generator = "name"

[[anonymization.attribute_keys]]
key = "first_name"
generator = "first_name"

[[anonymization.attribute_keys]]
key = "last_name"
generator = "last_name"

[[anonymization.attribute_keys]]
key = "nickname"
generator = "username"

[[anonymization.attribute_keys]]
key = "description"
generator = "sentence"

# Audit trail of rewritten rows (original values are SHA-256 hashed)
[anonymization.audit]
enabled = false
log_path = "./audit/anonymization.log"
json_format = true

# ============================================================================
# Logging
# ============================================================================
[logging]
local_enabled = true
local_path = "./logs"
# daily | hourly | never
local_rotation = "daily"
local_max_size_mb = 100
"#
        .to_string()
    }
}
