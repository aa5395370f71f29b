//! Restore/cleanup manager
//!
//! Closes a run on every exit path: releases the working copy (which
//! restores the source in in-place mode), removes the source dump once it is
//! no longer needed and removes a partial anonymized export after a failure.

use crate::config::schema::PipelineMode;
use crate::core::working_copy::{remove_file_if_exists, ReleaseOutcome, WorkingCopyManager};
use crate::domain::{Result, RunWarning};
use std::path::{Path, PathBuf};

/// Files a run may leave behind
#[derive(Debug, Clone)]
pub struct CleanupPlan {
    pub source_dump: PathBuf,
    pub anonymized_dump: PathBuf,
    pub keep_source_dump: bool,
}

/// How the steps before finalization ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct FinalizeReport {
    pub release: ReleaseOutcome,
    pub removed_files: Vec<PathBuf>,
    pub warnings: Vec<RunWarning>,
}

/// Finalize a run
///
/// Takes the manager by value so a run can only be finalized once.
///
/// # Arguments
///
/// * `working_copy` - Manager of the database the run mutated
/// * `plan` - Dump files the run may have written
/// * `outcome` - Whether the steps before finalization succeeded
///
/// # Errors
///
/// Returns [`DbAnonError::RestoreFailed`](crate::domain::DbAnonError::RestoreFailed)
/// if the in-place restore failed. File cleanup still happens in that case,
/// but the backup dump is kept. Other cleanup problems are warnings in the
/// report.
pub async fn finalize(
    mut working_copy: WorkingCopyManager,
    plan: &CleanupPlan,
    outcome: RunOutcome,
) -> Result<FinalizeReport> {
    tracing::info!(?outcome, "Finalizing run");
    let mut report = FinalizeReport::default();

    let released = working_copy.release().await;

    // In in-place mode the dump is the restore backup, owned by the manager
    if working_copy.mode() == PipelineMode::IsolatedCopy && !plan.keep_source_dump {
        remove(&plan.source_dump, &mut report).await;
    }
    if outcome == RunOutcome::Failed {
        remove(&plan.anonymized_dump, &mut report).await;
    }

    let release = released?;
    report.warnings.extend(release.warnings.iter().cloned());
    if let Some(backup) = &release.backup_removed {
        report.removed_files.push(backup.clone());
    }
    report.release = release;
    Ok(report)
}

async fn remove(path: &Path, report: &mut FinalizeReport) {
    match remove_file_if_exists(path).await {
        Ok(true) => {
            tracing::debug!(path = %path.display(), "Removed file");
            report.removed_files.push(path.to_path_buf());
        }
        Ok(false) => {}
        Err(e) => {
            let warning = RunWarning::CleanupFailed {
                resource: path.display().to_string(),
                reason: e.to_string(),
            };
            tracing::warn!(kind = warning.kind(), "{warning}");
            report.warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryCluster;
    use crate::domain::ids::DatabaseName;
    use crate::domain::DbAnonError;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn manager(cluster: &MemoryCluster, mode: PipelineMode, backup: PathBuf) -> WorkingCopyManager {
        WorkingCopyManager::new(
            mode,
            DatabaseName::new("app").unwrap(),
            DatabaseName::new("app_temp_1").unwrap(),
            backup,
            false,
            Arc::new(cluster.clone()),
            Arc::new(cluster.clone()),
        )
    }

    fn plan(dir: &std::path::Path, keep_source_dump: bool) -> CleanupPlan {
        CleanupPlan {
            source_dump: dir.join("app.sql"),
            anonymized_dump: dir.join("app_anonymized.sql"),
            keep_source_dump,
        }
    }

    #[tokio::test]
    async fn test_success_keeps_anonymized_export() {
        let dir = tempdir().unwrap();
        let plan = plan(dir.path(), false);
        std::fs::write(&plan.source_dump, "dump").unwrap();
        std::fs::write(&plan.anonymized_dump, "anon").unwrap();
        let cluster = MemoryCluster::new();

        let report = finalize(
            manager(&cluster, PipelineMode::IsolatedCopy, plan.source_dump.clone()),
            &plan,
            RunOutcome::Succeeded,
        )
        .await
        .unwrap();

        assert!(!plan.source_dump.exists());
        assert!(plan.anonymized_dump.exists());
        assert_eq!(report.removed_files, vec![plan.source_dump.clone()]);
    }

    #[tokio::test]
    async fn test_failure_removes_partial_export() {
        let dir = tempdir().unwrap();
        let plan = plan(dir.path(), true);
        std::fs::write(&plan.source_dump, "dump").unwrap();
        std::fs::write(&plan.anonymized_dump, "partial").unwrap();
        let cluster = MemoryCluster::new();

        finalize(
            manager(&cluster, PipelineMode::IsolatedCopy, plan.source_dump.clone()),
            &plan,
            RunOutcome::Failed,
        )
        .await
        .unwrap();

        assert!(plan.source_dump.exists());
        assert!(!plan.anonymized_dump.exists());
    }

    #[tokio::test]
    async fn test_restore_failure_propagates_and_keeps_backup() {
        let dir = tempdir().unwrap();
        let plan = plan(dir.path(), false);
        std::fs::write(&plan.source_dump, "not a dump").unwrap();
        let cluster = MemoryCluster::new();
        cluster.add_database("app");

        let mut working_copy =
            manager(&cluster, PipelineMode::InPlaceWithRestore, plan.source_dump.clone());
        working_copy.acquire(&plan.source_dump).await.unwrap();
        working_copy.mark_mutating();

        let err = finalize(working_copy, &plan, RunOutcome::Failed)
            .await
            .unwrap_err();

        assert!(matches!(err, DbAnonError::RestoreFailed { .. }));
        assert!(plan.source_dump.exists());
    }
}
