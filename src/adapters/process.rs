//! External dump/import utilities run as child processes
//!
//! `pg_dump` writes a plain SQL dump with `--clean --if-exists`, so importing
//! it with `psql` over an existing database restores it. The password reaches
//! the child through `PGPASSWORD`, never through its arguments.

use crate::adapters::database::traits::{DumpExecutor, ImportExecutor};
use crate::config::schema::DbAnonConfig;
use crate::config::SecretString;
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::ffi::OsString;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Longest stderr excerpt carried into an error message
const MAX_STDERR_CHARS: usize = 2000;

/// Runs `pg_dump` and `psql` with the configured connection settings
pub struct ProcessExecutor {
    dump_command: String,
    import_command: String,
    host: String,
    port: u16,
    user: String,
    password: SecretString,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn from_config(config: &DbAnonConfig) -> Self {
        Self {
            dump_command: config.tools.dump_command.clone(),
            import_command: config.tools.import_command.clone(),
            host: config.database.host.clone(),
            port: config.database.port,
            user: config.database.user.clone(),
            password: config.database.password.clone(),
            timeout: config.pipeline.command_timeout(),
        }
    }

    fn connection_args(&self) -> Vec<OsString> {
        vec![
            "--host".into(),
            self.host.clone().into(),
            "--port".into(),
            self.port.to_string().into(),
            "--username".into(),
            self.user.clone().into(),
            "--no-password".into(),
        ]
    }

    pub(crate) fn dump_args(&self, database: &DatabaseName, target: &Path) -> Vec<OsString> {
        let mut args = self.connection_args();
        args.extend([
            "--clean".into(),
            "--if-exists".into(),
            "--no-owner".into(),
            "--file".into(),
            target.as_os_str().to_owned(),
            database.as_str().into(),
        ]);
        args
    }

    pub(crate) fn import_args(&self, database: &DatabaseName, source: &Path) -> Vec<OsString> {
        let mut args = self.connection_args();
        args.extend([
            "--quiet".into(),
            "--set".into(),
            "ON_ERROR_STOP=1".into(),
            "--file".into(),
            source.as_os_str().to_owned(),
            "--dbname".into(),
            database.as_str().into(),
        ]);
        args
    }

    /// Run `program` to completion, bounded by the command timeout
    async fn run(&self, program: &str, args: Vec<OsString>) -> std::result::Result<Output, RunError> {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let password = self.password.expose_secret();
        if !password.is_empty() {
            command.env("PGPASSWORD", password.as_str());
        }

        tracing::debug!(program, "Spawning external command");

        match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) if output.status.success() => Ok(output),
            Ok(Ok(output)) => Err(RunError::Failed(format!(
                "{program} exited with {}: {}",
                output.status,
                stderr_excerpt(&output.stderr)
            ))),
            Ok(Err(e)) => Err(RunError::Failed(format!("failed to run {program}: {e}"))),
            Err(_) => Err(RunError::TimedOut),
        }
    }

    fn timed_out(&self, program: &str, database: &DatabaseName) -> DbAnonError {
        DbAnonError::OperationTimedOut {
            operation: format!("{program} {database}"),
            timeout: self.timeout,
        }
    }
}

enum RunError {
    Failed(String),
    TimedOut,
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.chars().count() > MAX_STDERR_CHARS {
        let cut: String = text.chars().take(MAX_STDERR_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

#[async_trait]
impl DumpExecutor for ProcessExecutor {
    async fn dump(&self, database: &DatabaseName, target: &Path) -> Result<()> {
        let args = self.dump_args(database, target);
        match self.run(&self.dump_command, args).await {
            Ok(_) => Ok(()),
            Err(RunError::TimedOut) => Err(self.timed_out(&self.dump_command, database)),
            Err(RunError::Failed(reason)) => Err(DbAnonError::ExportFailed(reason)),
        }
    }
}

#[async_trait]
impl ImportExecutor for ProcessExecutor {
    async fn import(&self, database: &DatabaseName, source: &Path) -> Result<()> {
        let args = self.import_args(database, source);
        match self.run(&self.import_command, args).await {
            Ok(_) => Ok(()),
            Err(RunError::TimedOut) => Err(self.timed_out(&self.import_command, database)),
            Err(RunError::Failed(reason)) => Err(DbAnonError::ImportFailed(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use std::path::PathBuf;

    fn executor(dump_command: &str, timeout: Duration) -> ProcessExecutor {
        let mut config = DbAnonConfig::default();
        config.database.name = "app".to_string();
        config.database.password = secret_string("s3cret".to_string());
        config.tools.dump_command = dump_command.to_string();
        let mut executor = ProcessExecutor::from_config(&config);
        executor.timeout = timeout;
        executor
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_dump_args_never_contain_password() {
        let executor = executor("pg_dump", Duration::from_secs(5));
        let db = DatabaseName::new("app").unwrap();
        let args = strings(executor.dump_args(&db, &PathBuf::from("/tmp/app.sql")));

        assert!(args.contains(&"--clean".to_string()));
        assert!(args.contains(&"--if-exists".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("app"));
        assert!(!args.iter().any(|a| a.contains("s3cret")));
    }

    #[test]
    fn test_import_args_stop_on_error() {
        let executor = executor("pg_dump", Duration::from_secs(5));
        let db = DatabaseName::new("app_temp").unwrap();
        let args = strings(executor.import_args(&db, &PathBuf::from("/tmp/app.sql")));

        assert!(args.contains(&"ON_ERROR_STOP=1".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("app_temp"));
    }

    #[test]
    fn test_stderr_excerpt_truncates() {
        let long = "x".repeat(MAX_STDERR_CHARS + 10);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert!(excerpt.ends_with("..."));
        assert_eq!(stderr_excerpt(b"  boom \n"), "boom");
    }

    #[tokio::test]
    async fn test_missing_binary_is_export_failure() {
        let executor = executor("dbanon-no-such-binary", Duration::from_secs(5));
        let db = DatabaseName::new("app").unwrap();
        let err = executor
            .dump(&db, &PathBuf::from("/tmp/never-written.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::ExportFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_zero_timeout_is_operation_timed_out() {
        let executor = executor("sh", Duration::ZERO);
        let db = DatabaseName::new("app").unwrap();
        let err = executor
            .dump(&db, &PathBuf::from("/tmp/never-written.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::OperationTimedOut { .. }));
        assert_eq!(err.exit_code(), 5);
    }
}
