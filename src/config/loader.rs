//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::DbAnonConfig;
use super::secret::secret_string;
use crate::domain::errors::DbAnonError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`DbAnonConfig`]
/// 4. Applies environment variable overrides (`DBANON_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`DbAnonError::Configuration`] if any of the steps above fails.
///
/// # Examples
///
/// ```no_run
/// use dbanon::config::loader::load_config;
///
/// let config = load_config("dbanon.toml").expect("Failed to load config");
/// println!("Anonymizing {}", config.database.name);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<DbAnonConfig> {
    let config = load_config_unvalidated(path)?;
    config.validate().map_err(|e| {
        DbAnonError::Configuration(format!("Configuration validation failed: {e}"))
    })?;
    Ok(config)
}

/// Loads and parses the configuration and applies overrides, without validating
///
/// The CLI uses this so that command-line overrides are applied before
/// validation runs.
pub fn load_config_unvalidated(path: impl AsRef<Path>) -> Result<DbAnonConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DbAnonError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        DbAnonError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: DbAnonConfig = toml::from_str(&contents)
        .map_err(|e| DbAnonError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are copied verbatim so that documented placeholders do not
/// have to be set.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| DbAnonError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(DbAnonError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| DbAnonError::Configuration(format!("Invalid value for {name}: {e}")))
}

fn env_override<T: FromStr>(name: &str, target: &mut T) -> Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Ok(val) = std::env::var(name) {
        *target = parse_env(name, &val)?;
    }
    Ok(())
}

/// Applies environment variable overrides using the `DBANON_*` prefix
///
/// Environment variables follow the pattern `DBANON_<SECTION>_<KEY>`, for
/// example `DBANON_DATABASE_HOST` or `DBANON_PIPELINE_MODE`.
fn apply_env_overrides(config: &mut DbAnonConfig) -> Result<()> {
    // Application overrides
    env_override("DBANON_APPLICATION_LOG_LEVEL", &mut config.application.log_level)?;
    env_override("DBANON_APPLICATION_DRY_RUN", &mut config.application.dry_run)?;

    // Database overrides
    env_override("DBANON_DATABASE_HOST", &mut config.database.host)?;
    env_override("DBANON_DATABASE_PORT", &mut config.database.port)?;
    env_override("DBANON_DATABASE_USER", &mut config.database.user)?;
    if let Ok(val) = std::env::var("DBANON_DATABASE_PASSWORD") {
        config.database.password = secret_string(val);
    }
    env_override("DBANON_DATABASE_NAME", &mut config.database.name)?;
    env_override(
        "DBANON_DATABASE_ADMIN_DATABASE",
        &mut config.database.admin_database,
    )?;
    env_override(
        "DBANON_DATABASE_MAX_CONNECTIONS",
        &mut config.database.max_connections,
    )?;

    // Pipeline overrides
    env_override("DBANON_PIPELINE_MODE", &mut config.pipeline.mode)?;
    if let Ok(val) = std::env::var("DBANON_PIPELINE_OUTPUT_DIR") {
        config.pipeline.output_dir = PathBuf::from(val);
    }
    env_override("DBANON_PIPELINE_BATCH_SIZE", &mut config.pipeline.batch_size)?;
    env_override(
        "DBANON_PIPELINE_MAX_PARALLEL_SCOPES",
        &mut config.pipeline.max_parallel_scopes,
    )?;
    env_override(
        "DBANON_PIPELINE_COMMAND_TIMEOUT_SECONDS",
        &mut config.pipeline.command_timeout_seconds,
    )?;
    env_override(
        "DBANON_PIPELINE_KEEP_SOURCE_DUMP",
        &mut config.pipeline.keep_source_dump,
    )?;

    // Tool overrides
    env_override("DBANON_TOOLS_DUMP_COMMAND", &mut config.tools.dump_command)?;
    env_override("DBANON_TOOLS_IMPORT_COMMAND", &mut config.tools.import_command)?;

    // Schema overrides
    env_override("DBANON_SCHEMA_TABLE_PREFIX", &mut config.schema.table_prefix)?;
    env_override("DBANON_SCHEMA_TENANCY", &mut config.schema.tenancy)?;

    // Anonymization overrides
    env_override(
        "DBANON_ANONYMIZATION_MAX_UNIQUE_ATTEMPTS",
        &mut config.anonymization.max_unique_attempts,
    )?;
    if let Ok(val) = std::env::var("DBANON_ANONYMIZATION_PROTECTED_IDS") {
        config.anonymization.protected_ids = val
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| parse_env("DBANON_ANONYMIZATION_PROTECTED_IDS", s))
            .collect::<Result<Vec<i64>>>()?;
    }
    env_override(
        "DBANON_ANONYMIZATION_AUDIT_ENABLED",
        &mut config.anonymization.audit.enabled,
    )?;

    // Logging overrides
    env_override("DBANON_LOGGING_LOCAL_ENABLED", &mut config.logging.local_enabled)?;
    env_override("DBANON_LOGGING_LOCAL_PATH", &mut config.logging.local_path)?;

    Ok(())
}
