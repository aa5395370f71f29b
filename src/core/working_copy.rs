//! Working-copy manager
//!
//! Owns the database that anonymization mutates and, in in-place mode, the
//! backup dump needed to undo it.
//!
//! - **Isolated copy**: a fresh database named `<db>_temp_<timestamp>` is
//!   created and loaded from the source dump. It is dropped on release,
//!   whatever happened in between.
//! - **In place with restore**: the source database itself is mutated. Once
//!   [`WorkingCopyManager::mark_mutating`] has been called, release restores
//!   the source from the dump and only then deletes the dump.

use crate::adapters::database::traits::{DatabaseBackend, ImportExecutor};
use crate::config::schema::PipelineMode;
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result, RunWarning};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The database anonymization runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingCopyHandle {
    pub database: DatabaseName,
    pub mode: PipelineMode,
}

/// What [`WorkingCopyManager::release`] did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseOutcome {
    /// Temporary database that was dropped
    pub dropped: Option<DatabaseName>,
    /// Whether the source was restored from the backup
    pub restored: bool,
    /// Backup dump deleted after the restore
    pub backup_removed: Option<PathBuf>,
    pub warnings: Vec<RunWarning>,
}

pub struct WorkingCopyManager {
    mode: PipelineMode,
    source: DatabaseName,
    working_name: DatabaseName,
    backup: PathBuf,
    keep_backup: bool,
    backend: Arc<dyn DatabaseBackend>,
    import: Arc<dyn ImportExecutor>,
    created: bool,
    mutating: bool,
    released: bool,
}

impl WorkingCopyManager {
    /// `backup` is the source dump; in in-place mode it is what a restore
    /// loads, and it is deleted after a confirmed restore unless
    /// `keep_backup` is set.
    pub fn new(
        mode: PipelineMode,
        source: DatabaseName,
        working_name: DatabaseName,
        backup: PathBuf,
        keep_backup: bool,
        backend: Arc<dyn DatabaseBackend>,
        import: Arc<dyn ImportExecutor>,
    ) -> Self {
        Self {
            mode,
            source,
            working_name,
            backup,
            keep_backup,
            backend,
            import,
            created: false,
            mutating: false,
            released: false,
        }
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    /// Name of the database anonymization will mutate
    pub fn target(&self) -> &DatabaseName {
        match self.mode {
            PipelineMode::IsolatedCopy => &self.working_name,
            PipelineMode::InPlaceWithRestore => &self.source,
        }
    }

    /// Prepare the working copy from `source_dump`
    ///
    /// # Errors
    ///
    /// - [`DbAnonError::WorkingCopyCreateFailed`] when the temporary database
    ///   already exists or cannot be created; an existing database is never
    ///   touched
    /// - [`DbAnonError::ImportFailed`] when the dump cannot be loaded; the
    ///   created database is still dropped by [`release`](Self::release)
    pub async fn acquire(&mut self, source_dump: &Path) -> Result<WorkingCopyHandle> {
        match self.mode {
            PipelineMode::IsolatedCopy => self.acquire_isolated(source_dump).await?,
            PipelineMode::InPlaceWithRestore => {
                self.backup = source_dump.to_path_buf();
                tracing::info!(
                    database = %self.source,
                    backup = %self.backup.display(),
                    "Working in place; source will be restored from backup"
                );
            }
        }

        Ok(WorkingCopyHandle {
            database: self.target().clone(),
            mode: self.mode,
        })
    }

    async fn acquire_isolated(&mut self, source_dump: &Path) -> Result<()> {
        let name = self.working_name.clone();

        let exists = self
            .backend
            .database_exists(&name)
            .await
            .map_err(|e| create_failed(&name, e.to_string()))?;
        if exists {
            return Err(create_failed(&name, "database already exists".to_string()));
        }

        self.backend
            .create_database(&name)
            .await
            .map_err(|e| create_failed(&name, e.to_string()))?;
        self.created = true;
        tracing::info!(database = %name, "Working copy created");

        self.import.import(&name, source_dump).await?;
        tracing::info!(database = %name, "Dump imported into working copy");
        Ok(())
    }

    /// Record that the target is about to be modified
    ///
    /// In in-place mode this arms the restore.
    pub fn mark_mutating(&mut self) {
        self.mutating = true;
    }

    /// Tear the working copy down
    ///
    /// Cleanup problems become warnings in the outcome. Releasing twice is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// [`DbAnonError::RestoreFailed`] when the in-place restore failed; the
    /// backup is kept.
    pub async fn release(&mut self) -> Result<ReleaseOutcome> {
        let mut outcome = ReleaseOutcome::default();
        if self.released {
            return Ok(outcome);
        }
        self.released = true;

        match self.mode {
            PipelineMode::IsolatedCopy => {
                if self.created {
                    match self.backend.drop_database(&self.working_name).await {
                        Ok(()) => {
                            tracing::info!(database = %self.working_name, "Working copy dropped");
                            outcome.dropped = Some(self.working_name.clone());
                        }
                        Err(e) => outcome.warnings.push(cleanup_warning(
                            format!("database {}", self.working_name),
                            e.to_string(),
                        )),
                    }
                }
            }
            PipelineMode::InPlaceWithRestore => {
                if self.mutating {
                    self.restore().await?;
                    outcome.restored = true;
                }
                if !self.keep_backup {
                    match remove_file_if_exists(&self.backup).await {
                        Ok(true) => outcome.backup_removed = Some(self.backup.clone()),
                        Ok(false) => {}
                        Err(e) => outcome.warnings.push(cleanup_warning(
                            self.backup.display().to_string(),
                            e.to_string(),
                        )),
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn restore(&self) -> Result<()> {
        tracing::info!(
            database = %self.source,
            backup = %self.backup.display(),
            "Restoring source database"
        );

        let restore_failed = |reason: String| {
            let err = DbAnonError::RestoreFailed {
                database: self.source.to_string(),
                backup: self.backup.display().to_string(),
                reason,
            };
            tracing::error!(error = %err, "Restore failed");
            err
        };

        if tokio::fs::metadata(&self.backup).await.is_err() {
            return Err(restore_failed("backup dump is missing".to_string()));
        }
        self.import
            .import(&self.source, &self.backup)
            .await
            .map_err(|e| restore_failed(e.to_string()))?;

        tracing::info!(database = %self.source, "Source database restored");
        Ok(())
    }
}

fn create_failed(name: &DatabaseName, reason: String) -> DbAnonError {
    DbAnonError::WorkingCopyCreateFailed {
        database: name.to_string(),
        reason,
    }
}

fn cleanup_warning(resource: String, reason: String) -> RunWarning {
    let warning = RunWarning::CleanupFailed { resource, reason };
    tracing::warn!(kind = warning.kind(), "{warning}");
    warning
}

/// Delete a file, returning whether it existed
pub(crate) async fn remove_file_if_exists(path: &Path) -> std::io::Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
