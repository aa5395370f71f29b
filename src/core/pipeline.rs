//! Pipeline orchestrator
//!
//! Sequences one anonymization run:
//!
//! ```text
//! Exporting -> AcquiringWorkingCopy -> Anonymizing -> ExportingResult -> Finalizing -> Done
//!     \                 \                   \                 \
//!      `-----------------`-------------------`-----------------`--> Finalizing -> Failed
//! ```
//!
//! Whatever step fails, the run goes through [`cleanup::finalize`] before the
//! error surfaces. A failed in-place restore supersedes the step error.

use crate::adapters::database::Capabilities;
use crate::anonymization::{AnonymizationEngine, AnonymizationReport, ValueGenerator};
use crate::config::schema::{DbAnonConfig, PipelineMode};
use crate::core::cleanup::{self, CleanupPlan, RunOutcome};
use crate::core::discovery::{table_exists, SchemaDiscovery};
use crate::core::snapshot::{check_output_dir, SnapshotService};
use crate::core::summary::RunSummary;
use crate::core::working_copy::WorkingCopyManager;
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result, RunWarning};
use crate::{log_error_with_context, log_step_complete, log_step_start};
use chrono::{DateTime, Local, TimeZone, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;

/// States of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Exporting,
    AcquiringWorkingCopy,
    Anonymizing,
    ExportingResult,
    Finalizing,
    Done,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// Whether the pipeline may move from `self` to `next`
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (Finalizing, Done | Failed) => true,
            (s, Finalizing) => !s.is_terminal() && *s != Finalizing,
            (Exporting, AcquiringWorkingCopy)
            | (AcquiringWorkingCopy, Anonymizing)
            | (Anonymizing, ExportingResult) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Exporting => "exporting",
            PipelineState::AcquiringWorkingCopy => "acquiring-working-copy",
            PipelineState::Anonymizing => "anonymizing",
            PipelineState::ExportingResult => "exporting-result",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Records the states a run passes through
#[derive(Debug, Default)]
struct StateTracker {
    history: Vec<PipelineState>,
}

impl StateTracker {
    fn advance(&mut self, next: PipelineState) {
        let allowed = match self.history.last() {
            None => next == PipelineState::Exporting || next == PipelineState::Finalizing,
            Some(current) => current.can_transition_to(next),
        };
        debug_assert!(allowed, "invalid pipeline transition to {next}");
        if !allowed {
            tracing::error!(state = %next, history = ?self.history, "Invalid pipeline transition");
        }
        tracing::debug!(state = %next, "Pipeline state");
        self.history.push(next);
    }
}

/// Everything fixed at the start of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub database: DatabaseName,
    /// Name of the temporary database in isolated-copy mode
    pub working_copy: DatabaseName,
    pub source_dump: PathBuf,
    pub anonymized_dump: PathBuf,
    pub mode: PipelineMode,
    pub dry_run: bool,
    pub keep_source_dump: bool,
    pub started_at: DateTime<Utc>,
}

impl RunContext {
    /// Derive the run's names and paths; `at` stamps the working copy name
    pub fn new<Tz: TimeZone>(config: &DbAnonConfig, at: &DateTime<Tz>) -> Result<Self>
    where
        Tz::Offset: fmt::Display,
    {
        let database = config.database_name().map_err(DbAnonError::Configuration)?;
        let working_copy = database
            .working_copy_name(at)
            .map_err(DbAnonError::Configuration)?;
        let output_dir = &config.pipeline.output_dir;

        Ok(Self {
            run_id: Uuid::new_v4(),
            source_dump: output_dir.join(database.dump_file_name()),
            anonymized_dump: output_dir.join(database.anonymized_dump_file_name()),
            database,
            working_copy,
            mode: config.pipeline.mode,
            dry_run: config.dry_run(),
            keep_source_dump: config.pipeline.keep_source_dump,
            started_at: at.with_timezone(&Utc),
        })
    }

    fn cleanup_plan(&self) -> CleanupPlan {
        CleanupPlan {
            source_dump: self.source_dump.clone(),
            anonymized_dump: self.anonymized_dump.clone(),
            keep_source_dump: self.keep_source_dump,
        }
    }

    /// Database anonymization mutates
    fn target(&self) -> &DatabaseName {
        match self.mode {
            PipelineMode::IsolatedCopy => &self.working_copy,
            PipelineMode::InPlaceWithRestore => &self.database,
        }
    }
}

/// Runs the anonymization pipeline against injected capabilities
pub struct PipelineOrchestrator {
    config: DbAnonConfig,
    capabilities: Capabilities,
    generator: Arc<dyn ValueGenerator>,
    shutdown: watch::Receiver<bool>,
}

impl PipelineOrchestrator {
    pub fn new(
        config: DbAnonConfig,
        capabilities: Capabilities,
        generator: Arc<dyn ValueGenerator>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            capabilities,
            generator,
            shutdown,
        }
    }

    /// Execute one run (or plan it, in dry-run mode)
    ///
    /// # Errors
    ///
    /// The first fatal step error, after the run has been finalized, or
    /// [`DbAnonError::RestoreFailed`] when the in-place restore failed.
    pub async fn run(&self) -> Result<RunSummary> {
        self.config.validate().map_err(DbAnonError::Configuration)?;
        let ctx = RunContext::new(&self.config, &Local::now())?;

        tracing::info!(
            run_id = %ctx.run_id,
            database = %ctx.database,
            mode = %ctx.mode,
            dry_run = ctx.dry_run,
            "Starting anonymization run"
        );

        if ctx.dry_run {
            self.plan(&ctx).await
        } else {
            self.execute(&ctx).await
        }
    }

    async fn execute(&self, ctx: &RunContext) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new(ctx);
        let mut tracker = StateTracker::default();
        let mut working_copy = WorkingCopyManager::new(
            ctx.mode,
            ctx.database.clone(),
            ctx.working_copy.clone(),
            ctx.source_dump.clone(),
            ctx.keep_source_dump,
            self.capabilities.backend.clone(),
            self.capabilities.import.clone(),
        );

        let steps = self
            .run_steps(ctx, &mut working_copy, &mut tracker, &mut summary)
            .await;

        tracker.advance(PipelineState::Finalizing);
        let outcome = if steps.is_ok() {
            RunOutcome::Succeeded
        } else {
            RunOutcome::Failed
        };
        let finalized = cleanup::finalize(working_copy, &ctx.cleanup_plan(), outcome).await;

        let result = match (steps, finalized) {
            (steps, Err(restore_error)) => {
                if let Err(step_error) = steps {
                    log_error_with_context!(step_error, "Step failed before the restore failed");
                }
                Err(restore_error)
            }
            (Err(step_error), Ok(report)) => {
                for warning in &report.warnings {
                    tracing::warn!(kind = warning.kind(), "{warning}");
                }
                Err(step_error)
            }
            (Ok(()), Ok(report)) => {
                summary.cleanup_warnings = report.warnings;
                Ok(())
            }
        };

        summary.duration = started.elapsed();
        match result {
            Ok(()) => {
                tracker.advance(PipelineState::Done);
                summary.state_history = tracker.history;
                summary.log_summary();
                Ok(summary)
            }
            Err(e) => {
                tracker.advance(PipelineState::Failed);
                tracing::error!(
                    run_id = %ctx.run_id,
                    kind = e.kind(),
                    states = ?tracker.history,
                    error = %e,
                    "Run failed"
                );
                Err(e)
            }
        }
    }

    async fn run_steps(
        &self,
        ctx: &RunContext,
        working_copy: &mut WorkingCopyManager,
        tracker: &mut StateTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let snapshot = SnapshotService::new(self.capabilities.dump.clone());

        self.check_cancelled(PipelineState::Exporting)?;
        tracker.advance(PipelineState::Exporting);
        let step = Instant::now();
        log_step_start!(PipelineState::Exporting, ctx.database);
        snapshot.export(&ctx.database, &ctx.source_dump).await?;
        log_step_complete!(PipelineState::Exporting, step.elapsed());

        self.check_cancelled(PipelineState::AcquiringWorkingCopy)?;
        tracker.advance(PipelineState::AcquiringWorkingCopy);
        let step = Instant::now();
        log_step_start!(PipelineState::AcquiringWorkingCopy, ctx.target());
        let handle = working_copy.acquire(&ctx.source_dump).await?;
        log_step_complete!(PipelineState::AcquiringWorkingCopy, step.elapsed());

        self.check_cancelled(PipelineState::Anonymizing)?;
        tracker.advance(PipelineState::Anonymizing);
        let step = Instant::now();
        log_step_start!(PipelineState::Anonymizing, handle.database);
        let report = self.anonymize(&handle.database, working_copy, summary).await?;
        summary.report.merge(report);
        log_step_complete!(PipelineState::Anonymizing, step.elapsed());

        self.check_cancelled(PipelineState::ExportingResult)?;
        tracker.advance(PipelineState::ExportingResult);
        let step = Instant::now();
        log_step_start!(PipelineState::ExportingResult, handle.database);
        let exported = snapshot
            .export(&handle.database, &ctx.anonymized_dump)
            .await?;
        summary.output_path = Some(exported.path);
        summary.output_bytes = Some(exported.bytes);
        log_step_complete!(PipelineState::ExportingResult, step.elapsed());

        Ok(())
    }

    async fn anonymize(
        &self,
        target: &DatabaseName,
        working_copy: &mut WorkingCopyManager,
        summary: &mut RunSummary,
    ) -> Result<AnonymizationReport> {
        let store = self.capabilities.backend.connect(target).await?;
        let discovery = SchemaDiscovery::new(target.clone(), &self.config.schema)?;
        let scopes = discovery.discover_scopes(store.as_ref()).await?;
        summary.scopes = scopes.len();

        let engine = AnonymizationEngine::new(&self.config, self.generator.clone())?
            .with_shutdown(self.shutdown.clone());

        working_copy.mark_mutating();

        let reports: Vec<AnonymizationReport> = stream::iter(scopes.iter())
            .map(|scope| engine.anonymize_scope(store.as_ref(), scope))
            .buffer_unordered(self.config.pipeline.max_parallel_scopes.max(1))
            .try_collect()
            .await?;

        let mut total = AnonymizationReport::new();
        for report in reports {
            total.merge(report);
        }
        Ok(total)
    }

    /// Read-only planning pass used by dry runs
    async fn plan(&self, ctx: &RunContext) -> Result<RunSummary> {
        let mut summary = RunSummary::new(ctx);

        check_output_dir(&self.config.pipeline.output_dir).await?;

        let store = self.capabilities.backend.connect(&ctx.database).await?;
        let discovery = SchemaDiscovery::new(ctx.database.clone(), &self.config.schema)?;
        let scopes = discovery.discover_scopes(store.as_ref()).await?;
        summary.scopes = scopes.len();

        let schema = &self.config.schema;
        for scope in &scopes {
            for logical in [&schema.identity_table, &schema.attribute_table] {
                if !table_exists(store.as_ref(), scope, logical).await? {
                    summary.report.record_warning(RunWarning::TableMissing {
                        table: scope.table(logical),
                    });
                }
            }
        }

        summary.planned_steps = planned_steps(ctx, scopes.len());
        for (i, step) in summary.planned_steps.iter().enumerate() {
            tracing::info!(step = i + 1, "Planned: {step}");
        }
        summary.log_summary();
        Ok(summary)
    }

    fn check_cancelled(&self, next: PipelineState) -> Result<()> {
        if *self.shutdown.borrow() {
            return Err(DbAnonError::Cancelled(format!("interrupted before {next}")));
        }
        Ok(())
    }
}

/// Steps a run would execute, in order
pub fn planned_steps(ctx: &RunContext, scopes: usize) -> Vec<String> {
    let source = ctx.source_dump.display();
    let anonymized = ctx.anonymized_dump.display();
    let mut steps = vec![format!("export {} to {source}", ctx.database)];

    match ctx.mode {
        PipelineMode::IsolatedCopy => {
            steps.push(format!("create working copy {}", ctx.working_copy));
            steps.push(format!("import {source} into {}", ctx.working_copy));
            steps.push(format!(
                "anonymize {scopes} scope(s) in {}",
                ctx.working_copy
            ));
            steps.push(format!("export {} to {anonymized}", ctx.working_copy));
            steps.push(format!("drop working copy {}", ctx.working_copy));
            if !ctx.keep_source_dump {
                steps.push(format!("delete {source}"));
            }
        }
        PipelineMode::InPlaceWithRestore => {
            steps.push(format!(
                "anonymize {scopes} scope(s) in {} (in place)",
                ctx.database
            ));
            steps.push(format!("export {} to {anonymized}", ctx.database));
            steps.push(format!("restore {} from {source}", ctx.database));
            if !ctx.keep_source_dump {
                steps.push(format!("delete {source}"));
            }
        }
    }
    steps
}
