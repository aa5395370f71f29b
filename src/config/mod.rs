//! Configuration management for dbanon.
//!
//! dbanon reads a single TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `DBANON_<SECTION>_<KEY>` environment overrides
//! - Default values for every optional setting
//! - Validation before any database is touched
//!
//! # Example Configuration
//!
//! ```toml
//! [database]
//! host = "localhost"
//! user = "postgres"
//! password = "${DBANON_DB_PASSWORD}"
//! name = "wordpress"
//!
//! [pipeline]
//! mode = "isolated-copy"
//! output_dir = "./dumps"
//!
//! [schema]
//! table_prefix = "wp_"
//! tenancy = "auto"
//! ```
//!
//! ```rust,no_run
//! use dbanon::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dbanon.toml")?;
//! println!("Mode: {}", config.pipeline.mode);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_unvalidated};
pub use schema::{
    ApplicationConfig, DatabaseConfig, DbAnonConfig, LoggingConfig, PipelineConfig, PipelineMode,
    SchemaConfig, Tenancy, ToolsConfig,
};
pub use secret::{empty_secret, secret_string, SecretString, SecretValue};
