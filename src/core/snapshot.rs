//! Snapshot/export service
//!
//! Dumps a database to a file through the [`DumpExecutor`] capability after
//! verifying that the destination directory can take the file.

use crate::adapters::database::traits::DumpExecutor;
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A dump written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Writes database dumps
#[derive(Clone)]
pub struct SnapshotService {
    dump: Arc<dyn DumpExecutor>,
}

impl SnapshotService {
    pub fn new(dump: Arc<dyn DumpExecutor>) -> Self {
        Self { dump }
    }

    /// Dump `database` to `target`, replacing any file already there
    ///
    /// # Arguments
    ///
    /// * `database` - Database to dump
    /// * `target` - Output file; its parent directory must already exist
    ///
    /// # Errors
    ///
    /// [`DbAnonError::ExportFailed`] if the directory is not writable, the
    /// dump utility fails, or no file exists afterwards.
    pub async fn export(&self, database: &DatabaseName, target: &Path) -> Result<ExportOutcome> {
        let started = Instant::now();
        ensure_writable_dir(parent_dir(target)).await?;

        // A stale file must not pass for a fresh dump
        match tokio::fs::remove_file(target).await {
            Ok(()) => tracing::debug!(path = %target.display(), "Replaced previous dump"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(DbAnonError::ExportFailed(format!(
                    "cannot replace {}: {e}",
                    target.display()
                )))
            }
        }

        self.dump.dump(database, target).await?;

        let bytes = match tokio::fs::metadata(target).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                return Err(DbAnonError::ExportFailed(format!(
                    "dump of {database} reported success but {} was not written",
                    target.display()
                )))
            }
        };

        tracing::info!(
            database = %database,
            path = %target.display(),
            bytes,
            duration_ms = started.elapsed().as_millis() as u64,
            "Database exported"
        );

        Ok(ExportOutcome {
            path: target.to_path_buf(),
            bytes,
        })
    }
}

/// Directory a file will be written into; `.` for bare file names
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Read-only check that `dir` is an existing, writable directory
///
/// Used by dry runs; nothing is created.
pub async fn check_output_dir(dir: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(dir).await.map_err(|e| {
        DbAnonError::ExportFailed(format!(
            "output directory {} is not accessible: {e}",
            dir.display()
        ))
    })?;

    if !meta.is_dir() {
        return Err(DbAnonError::ExportFailed(format!(
            "output path {} is not a directory",
            dir.display()
        )));
    }
    if meta.permissions().readonly() {
        return Err(DbAnonError::ExportFailed(format!(
            "output directory {} is read-only",
            dir.display()
        )));
    }
    Ok(())
}

/// Check `dir` and prove it writable by creating and removing a probe file
pub async fn ensure_writable_dir(dir: &Path) -> Result<()> {
    check_output_dir(dir).await?;

    let probe = dir.join(format!(".dbanon-probe-{}", Uuid::new_v4()));
    tokio::fs::write(&probe, b"").await.map_err(|e| {
        DbAnonError::ExportFailed(format!(
            "output directory {} is not writable: {e}",
            dir.display()
        ))
    })?;
    if let Err(e) = tokio::fs::remove_file(&probe).await {
        tracing::warn!(path = %probe.display(), error = %e, "Failed to remove write probe");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{row, MemoryCluster};
    use async_trait::async_trait;
    use tempfile::tempdir;

    /// Succeeds without writing anything
    struct SilentDump;

    #[async_trait]
    impl DumpExecutor for SilentDump {
        async fn dump(&self, _database: &DatabaseName, _target: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn seeded_cluster() -> MemoryCluster {
        let cluster = MemoryCluster::new();
        cluster.add_table("app", "wp_users", vec![row([("ID", "1")])]);
        cluster
    }

    #[tokio::test]
    async fn test_export_writes_dump() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.sql");
        let service = SnapshotService::new(Arc::new(seeded_cluster()));

        let outcome = service
            .export(&DatabaseName::new("app").unwrap(), &target)
            .await
            .unwrap();

        assert_eq!(outcome.path, target);
        assert!(outcome.bytes > 0);
        assert_eq!(std::fs::metadata(&target).unwrap().len(), outcome.bytes);
    }

    #[tokio::test]
    async fn test_export_overwrites_existing_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.sql");
        std::fs::write(&target, "x".repeat(100_000)).unwrap();
        let service = SnapshotService::new(Arc::new(seeded_cluster()));

        let outcome = service
            .export(&DatabaseName::new("app").unwrap(), &target)
            .await
            .unwrap();

        assert!(outcome.bytes < 100_000);
        assert!(!std::fs::read_to_string(&target).unwrap().starts_with("xxx"));
    }

    #[tokio::test]
    async fn test_missing_output_file_is_failure() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("app.sql");
        std::fs::write(&target, "stale").unwrap();
        let service = SnapshotService::new(Arc::new(SilentDump));

        let err = service
            .export(&DatabaseName::new("app").unwrap(), &target)
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::ExportFailed(_)));
    }

    #[tokio::test]
    async fn test_dump_failure_propagates() {
        let dir = tempdir().unwrap();
        let cluster = seeded_cluster();
        cluster.fail_dump_when(|_| true);
        let service = SnapshotService::new(Arc::new(cluster));

        let err = service
            .export(&DatabaseName::new("app").unwrap(), &dir.path().join("app.sql"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::ExportFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_directory_rejected() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(check_output_dir(&missing).await.is_err());
        assert!(ensure_writable_dir(&missing).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_leaves_no_file() {
        let dir = tempdir().unwrap();
        ensure_writable_dir(dir.path()).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_parent_dir_of_bare_name() {
        assert_eq!(parent_dir(Path::new("app.sql")), Path::new("."));
        assert_eq!(parent_dir(Path::new("out/app.sql")), Path::new("out"));
    }
}
