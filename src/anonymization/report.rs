//! Per-scope anonymization counters

use crate::domain::RunWarning;
use serde::Serialize;

/// Outcome of anonymizing one scope, or the sum over several scopes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnonymizationReport {
    /// Identity rows read from the identity table
    pub rows_seen: u64,

    /// Identity rows rewritten with synthetic values
    pub rows_anonymized: u64,

    /// Identity rows skipped because their key is protected
    pub rows_protected: u64,

    /// Identity rows whose update failed
    pub rows_failed: u64,

    /// Attribute values rewritten
    pub meta_values_anonymized: u64,

    /// Attribute values whose update failed
    pub meta_values_failed: u64,

    /// Expected tables that were absent
    pub tables_missing: u64,

    #[serde(skip)]
    pub warnings: Vec<RunWarning>,
}

impl AnonymizationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_warning(&mut self, warning: RunWarning) {
        tracing::warn!(kind = warning.kind(), "{warning}");
        if matches!(warning, RunWarning::TableMissing { .. }) {
            self.tables_missing += 1;
        }
        self.warnings.push(warning);
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: AnonymizationReport) {
        self.rows_seen += other.rows_seen;
        self.rows_anonymized += other.rows_anonymized;
        self.rows_protected += other.rows_protected;
        self.rows_failed += other.rows_failed;
        self.meta_values_anonymized += other.meta_values_anonymized;
        self.meta_values_failed += other.meta_values_failed;
        self.tables_missing += other.tables_missing;
        self.warnings.extend(other.warnings);
    }

    /// Emit the counters as one structured event
    pub fn log_summary(&self, scope: &str) {
        tracing::info!(
            scope,
            rows_seen = self.rows_seen,
            rows_anonymized = self.rows_anonymized,
            rows_protected = self.rows_protected,
            rows_failed = self.rows_failed,
            meta_values_anonymized = self.meta_values_anonymized,
            meta_values_failed = self.meta_values_failed,
            tables_missing = self.tables_missing,
            "Scope anonymized"
        );
    }
}
