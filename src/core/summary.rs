//! Run summary and reporting

use crate::anonymization::AnonymizationReport;
use crate::config::schema::PipelineMode;
use crate::core::pipeline::{PipelineState, RunContext};
use crate::domain::RunWarning;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Summary of one pipeline run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Correlates every log event of the run
    pub run_id: Uuid,

    pub database: String,

    pub mode: PipelineMode,

    pub dry_run: bool,

    /// Steps a dry run would execute, in order
    pub planned_steps: Vec<String>,

    /// States the pipeline went through
    pub state_history: Vec<PipelineState>,

    /// Number of tenant scopes discovered
    pub scopes: usize,

    /// Counters summed over all scopes
    pub report: AnonymizationReport,

    /// Warnings raised while finalizing
    pub cleanup_warnings: Vec<RunWarning>,

    /// Anonymized export, once written
    pub output_path: Option<PathBuf>,

    pub output_bytes: Option<u64>,

    pub duration: Duration,
}

impl RunSummary {
    pub fn new(ctx: &RunContext) -> Self {
        Self {
            run_id: ctx.run_id,
            database: ctx.database.to_string(),
            mode: ctx.mode,
            dry_run: ctx.dry_run,
            planned_steps: Vec::new(),
            state_history: Vec::new(),
            scopes: 0,
            report: AnonymizationReport::new(),
            cleanup_warnings: Vec::new(),
            output_path: None,
            output_bytes: None,
            duration: Duration::ZERO,
        }
    }

    /// All warnings of the run, anonymization first
    pub fn warnings(&self) -> impl Iterator<Item = &RunWarning> {
        self.report.warnings.iter().chain(&self.cleanup_warnings)
    }

    pub fn warning_count(&self) -> usize {
        self.report.warnings.len() + self.cleanup_warnings.len()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            run_id = %self.run_id,
            database = %self.database,
            mode = %self.mode,
            dry_run = self.dry_run,
            scopes = self.scopes,
            rows_anonymized = self.report.rows_anonymized,
            rows_protected = self.report.rows_protected,
            rows_failed = self.report.rows_failed,
            meta_values_anonymized = self.report.meta_values_anonymized,
            tables_missing = self.report.tables_missing,
            warnings = self.warning_count(),
            duration_secs = self.duration.as_secs(),
            "Run completed"
        );
    }

    /// Format summary for console output
    pub fn format_console(&self) -> String {
        let mut out = String::new();
        let rule = "───────────────────────────────────────────────────────────────";

        if self.dry_run {
            let _ = writeln!(out, "DRY RUN: {} ({})", self.database, self.mode);
            let _ = writeln!(out, "{rule}");
            let _ = writeln!(out, "  Scopes discovered: {}", self.scopes);
            let _ = writeln!(out, "  Planned steps:");
            for (i, step) in self.planned_steps.iter().enumerate() {
                let _ = writeln!(out, "    {}. {step}", i + 1);
            }
        } else {
            let _ = writeln!(out, "ANONYMIZATION SUMMARY: {} ({})", self.database, self.mode);
            let _ = writeln!(out, "{rule}");
            let _ = writeln!(out, "  Scopes:                 {}", self.scopes);
            let _ = writeln!(out, "  Rows anonymized:        {}", self.report.rows_anonymized);
            let _ = writeln!(out, "  Rows protected:         {}", self.report.rows_protected);
            let _ = writeln!(out, "  Rows failed:            {}", self.report.rows_failed);
            let _ = writeln!(
                out,
                "  Attribute values:       {}",
                self.report.meta_values_anonymized
            );
            let _ = writeln!(out, "  Tables missing:         {}", self.report.tables_missing);
            if let Some(path) = &self.output_path {
                let _ = writeln!(out, "  Output:                 {}", path.display());
            }
            let _ = writeln!(out, "  Duration:               {:.1}s", self.duration.as_secs_f64());
        }

        if self.warning_count() > 0 {
            let _ = writeln!(out, "\n  Warnings:");
            for warning in self.warnings() {
                let _ = writeln!(out, "    - {warning}");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DbAnonConfig;
    use chrono::Utc;

    fn summary() -> RunSummary {
        let mut config = DbAnonConfig::default();
        config.database.name = "app".to_string();
        let ctx = RunContext::new(&config, &Utc::now()).unwrap();
        RunSummary::new(&ctx)
    }

    #[test]
    fn test_warnings_chain_report_and_cleanup() {
        let mut summary = summary();
        summary.report.record_warning(RunWarning::TableMissing {
            table: "wp_usermeta".to_string(),
        });
        summary.cleanup_warnings.push(RunWarning::CleanupFailed {
            resource: "app.sql".to_string(),
            reason: "busy".to_string(),
        });

        assert_eq!(summary.warning_count(), 2);
        let kinds: Vec<_> = summary.warnings().map(RunWarning::kind).collect();
        assert_eq!(kinds, vec!["TableMissingWarning", "CleanupFailedWarning"]);
    }

    #[test]
    fn test_format_console() {
        let mut summary = summary();
        summary.report.rows_anonymized = 2;
        summary.report.rows_protected = 1;
        summary.output_path = Some(PathBuf::from("./app_anonymized.sql"));

        let output = summary.format_console();
        assert!(output.contains("ANONYMIZATION SUMMARY: app (isolated-copy)"));
        assert!(output.contains("Rows anonymized:        2"));
        assert!(output.contains("./app_anonymized.sql"));
        assert!(!output.contains("Warnings"));
    }

    #[test]
    fn test_format_console_dry_run() {
        let mut summary = summary();
        summary.dry_run = true;
        summary.planned_steps = vec!["export app".to_string(), "anonymize".to_string()];

        let output = summary.format_console();
        assert!(output.contains("DRY RUN"));
        assert!(output.contains("2. anonymize"));
    }
}
