//! Configuration schema types
//!
//! This module defines the configuration structure for dbanon. Every section
//! has serde defaults so that a minimal file only needs `[database] name`.

use crate::anonymization::config::AnonymizationConfig;
use crate::config::secret::{empty_secret, SecretString};
use crate::domain::ids::{is_valid_identifier, DatabaseName, TablePrefix};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How the pipeline obtains the database it mutates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    /// Import the dump into a disposable, uniquely named database
    #[default]
    IsolatedCopy,
    /// Mutate the source database and restore it from the dump afterwards
    InPlaceWithRestore,
}

impl fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineMode::IsolatedCopy => write!(f, "isolated-copy"),
            PipelineMode::InPlaceWithRestore => write!(f, "in-place-with-restore"),
        }
    }
}

impl FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolated-copy" => Ok(PipelineMode::IsolatedCopy),
            "in-place-with-restore" => Ok(PipelineMode::InPlaceWithRestore),
            other => Err(format!(
                "Invalid pipeline mode '{other}'. Must be one of: isolated-copy, in-place-with-restore"
            )),
        }
    }
}

/// Tenant layout of the source database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tenancy {
    /// One table namespace using the base prefix
    Single,
    /// One namespace per row of the tenant registry table
    Multi,
    /// Multi when the registry table exists, single otherwise
    #[default]
    Auto,
}

impl FromStr for Tenancy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(Tenancy::Single),
            "multi" => Ok(Tenancy::Multi),
            "auto" => Ok(Tenancy::Auto),
            other => Err(format!(
                "Invalid schema.tenancy '{other}'. Must be one of: single, multi, auto"
            )),
        }
    }
}

/// Main dbanon configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DbAnonConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Connection settings of the source database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Pipeline behaviour (mode, output, batching, timeouts)
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// External dump/import utilities
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Table layout of the source database
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Anonymization rules
    #[serde(default)]
    pub anonymization: AnonymizationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DbAnonConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.database.validate()?;
        self.pipeline.validate()?;
        self.tools.validate()?;
        self.schema.validate()?;
        self.anonymization.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Validated name of the source database
    pub fn database_name(&self) -> Result<DatabaseName, String> {
        DatabaseName::new(self.database.name.clone())
    }

    /// Validated base table prefix
    pub fn base_prefix(&self) -> Result<TablePrefix, String> {
        TablePrefix::new(self.schema.table_prefix.clone())
    }

    /// Effective dry-run flag
    pub fn dry_run(&self) -> bool {
        self.application.dry_run
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Plan the run without writing anything
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// PostgreSQL connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_user")]
    pub user: String,

    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default = "empty_secret")]
    pub password: SecretString,

    /// Name of the source database
    #[serde(default)]
    pub name: String,

    /// Maintenance database used for CREATE/DROP DATABASE
    #[serde(default = "default_admin_database")]
    pub admin_database: String,

    /// Maximum number of connections per pool
    #[serde(default = "default_pg_max_connections")]
    pub max_connections: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_pg_connection_timeout_seconds")]
    pub connection_timeout_seconds: u64,

    /// Per-statement timeout in seconds
    #[serde(default = "default_pg_statement_timeout_seconds")]
    pub statement_timeout_seconds: u64,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("database.host cannot be empty".to_string());
        }
        if self.port == 0 {
            return Err("database.port must be > 0".to_string());
        }
        if self.user.trim().is_empty() {
            return Err("database.user cannot be empty".to_string());
        }
        DatabaseName::new(self.name.clone()).map_err(|e| format!("database.name: {e}"))?;
        DatabaseName::new(self.admin_database.clone())
            .map_err(|e| format!("database.admin_database: {e}"))?;
        if self.admin_database == self.name {
            return Err("database.admin_database must differ from database.name".to_string());
        }
        if self.max_connections == 0 || self.max_connections > 100 {
            return Err(format!(
                "database.max_connections must be between 1 and 100, got {}",
                self.max_connections
            ));
        }
        if self.connection_timeout_seconds == 0 {
            return Err("database.connection_timeout_seconds must be > 0".to_string());
        }
        if self.statement_timeout_seconds == 0 {
            return Err("database.statement_timeout_seconds must be > 0".to_string());
        }
        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_seconds)
    }

    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_seconds)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: empty_secret(),
            name: String::new(),
            admin_database: default_admin_database(),
            max_connections: default_pg_max_connections(),
            connection_timeout_seconds: default_pg_connection_timeout_seconds(),
            statement_timeout_seconds: default_pg_statement_timeout_seconds(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub mode: PipelineMode,

    /// Directory receiving `<db>.sql` and `<db>_anonymized.sql`
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Rows per keyset page
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Tenant scopes anonymized concurrently
    #[serde(default = "default_max_parallel_scopes")]
    pub max_parallel_scopes: usize,

    /// Upper bound for a single dump or import command
    #[serde(default = "default_command_timeout_seconds")]
    pub command_timeout_seconds: u64,

    /// Keep `<db>.sql` after an isolated-copy run
    #[serde(default)]
    pub keep_source_dump: bool,
}

impl PipelineConfig {
    fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > 10_000 {
            return Err(format!(
                "pipeline.batch_size must be between 1 and 10000, got {}",
                self.batch_size
            ));
        }
        if self.max_parallel_scopes == 0 || self.max_parallel_scopes > 64 {
            return Err(format!(
                "pipeline.max_parallel_scopes must be between 1 and 64, got {}",
                self.max_parallel_scopes
            ));
        }
        if self.command_timeout_seconds == 0 {
            return Err("pipeline.command_timeout_seconds must be > 0".to_string());
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err("pipeline.output_dir cannot be empty".to_string());
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_seconds)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::default(),
            output_dir: default_output_dir(),
            batch_size: default_batch_size(),
            max_parallel_scopes: default_max_parallel_scopes(),
            command_timeout_seconds: default_command_timeout_seconds(),
            keep_source_dump: false,
        }
    }
}

/// External utilities used for dump and import
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_dump_command")]
    pub dump_command: String,

    #[serde(default = "default_import_command")]
    pub import_command: String,
}

impl ToolsConfig {
    fn validate(&self) -> Result<(), String> {
        if self.dump_command.trim().is_empty() {
            return Err("tools.dump_command cannot be empty".to_string());
        }
        if self.import_command.trim().is_empty() {
            return Err("tools.import_command cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dump_command: default_dump_command(),
            import_command: default_import_command(),
        }
    }
}

/// Table layout of the source database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Base table prefix (may be empty)
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    #[serde(default = "default_identity_table")]
    pub identity_table: String,

    /// Integer primary key of the identity table
    #[serde(default = "default_identity_key")]
    pub identity_key: String,

    #[serde(default = "default_attribute_table")]
    pub attribute_table: String,

    #[serde(default = "default_attribute_owner_column")]
    pub attribute_owner_column: String,

    #[serde(default = "default_attribute_key_column")]
    pub attribute_key_column: String,

    #[serde(default = "default_attribute_value_column")]
    pub attribute_value_column: String,

    #[serde(default)]
    pub tenancy: Tenancy,

    #[serde(default = "default_tenant_registry_table")]
    pub tenant_registry_table: String,

    #[serde(default = "default_tenant_id_column")]
    pub tenant_id_column: String,

    /// Tenant whose tables use the base prefix
    #[serde(default = "default_main_tenant_id")]
    pub main_tenant_id: i64,
}

impl SchemaConfig {
    fn validate(&self) -> Result<(), String> {
        TablePrefix::new(self.table_prefix.clone())
            .map_err(|e| format!("schema.table_prefix: {e}"))?;

        let identifiers = [
            ("schema.identity_table", &self.identity_table),
            ("schema.identity_key", &self.identity_key),
            ("schema.attribute_table", &self.attribute_table),
            ("schema.attribute_owner_column", &self.attribute_owner_column),
            ("schema.attribute_key_column", &self.attribute_key_column),
            ("schema.attribute_value_column", &self.attribute_value_column),
            ("schema.tenant_registry_table", &self.tenant_registry_table),
            ("schema.tenant_id_column", &self.tenant_id_column),
        ];
        for (field, value) in identifiers {
            if !is_valid_identifier(value) {
                return Err(format!("{field} '{value}' is not a valid identifier"));
            }
        }

        if self.main_tenant_id <= 0 {
            return Err("schema.main_tenant_id must be > 0".to_string());
        }
        Ok(())
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            identity_table: default_identity_table(),
            identity_key: default_identity_key(),
            attribute_table: default_attribute_table(),
            attribute_owner_column: default_attribute_owner_column(),
            attribute_key_column: default_attribute_key_column(),
            attribute_value_column: default_attribute_value_column(),
            tenancy: Tenancy::default(),
            tenant_registry_table: default_tenant_registry_table(),
            tenant_id_column: default_tenant_id_column(),
            main_tenant_id: default_main_tenant_id(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,

    /// Maximum log file size in MB
    #[serde(default = "default_local_max_size_mb")]
    pub local_max_size_mb: usize,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }

        if self.local_max_size_mb == 0 {
            return Err("logging.local_max_size_mb must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
            local_max_size_mb: default_local_max_size_mb(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_user() -> String {
    "postgres".to_string()
}

fn default_admin_database() -> String {
    "postgres".to_string()
}

fn default_pg_max_connections() -> usize {
    8
}

fn default_pg_connection_timeout_seconds() -> u64 {
    30
}

fn default_pg_statement_timeout_seconds() -> u64 {
    60
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_batch_size() -> usize {
    500
}

fn default_max_parallel_scopes() -> usize {
    4
}

fn default_command_timeout_seconds() -> u64 {
    3600
}

fn default_dump_command() -> String {
    "pg_dump".to_string()
}

fn default_import_command() -> String {
    "psql".to_string()
}

fn default_table_prefix() -> String {
    "wp_".to_string()
}

fn default_identity_table() -> String {
    "users".to_string()
}

fn default_identity_key() -> String {
    "ID".to_string()
}

fn default_attribute_table() -> String {
    "usermeta".to_string()
}

fn default_attribute_owner_column() -> String {
    "user_id".to_string()
}

fn default_attribute_key_column() -> String {
    "meta_key".to_string()
}

fn default_attribute_value_column() -> String {
    "meta_value".to_string()
}

fn default_tenant_registry_table() -> String {
    "blogs".to_string()
}

fn default_tenant_id_column() -> String {
    "blog_id".to_string()
}

fn default_main_tenant_id() -> i64 {
    1
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}

fn default_local_max_size_mb() -> usize {
    100
}
