//! Domain error types
//!
//! This module defines the error hierarchy for dbanon. Fatal pipeline conditions
//! are variants of [`DbAnonError`]; non-fatal conditions are [`RunWarning`]s that
//! are recorded in the run summary and never abort a run.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Main dbanon error type
///
/// Every variant except [`DbAnonError::RestoreFailed`] leaves the source
/// database in its original state once the pipeline has finalized.
#[derive(Debug, Error)]
pub enum DbAnonError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The source database could not be dumped
    #[error("Export failed: {0}")]
    ExportFailed(String),

    /// A dump could not be loaded into the working copy
    #[error("Import failed: {0}")]
    ImportFailed(String),

    /// The working copy database could not be created
    #[error("Failed to create working copy '{database}': {reason}")]
    WorkingCopyCreateFailed { database: String, reason: String },

    /// No unused value could be generated for a unique-within-run field
    #[error("Unique value generation exhausted for '{class}' after {attempts} attempts")]
    UniqueGenerationExhausted { class: String, attempts: usize },

    /// A single-tenant source holds no identity rows at all
    #[error("No identities found in table '{table}'")]
    NoIdentitiesFound { table: String },

    /// An external command or database call exceeded its time budget
    #[error("Operation '{operation}' timed out after {}s", .timeout.as_secs())]
    OperationTimedOut {
        operation: String,
        timeout: Duration,
    },

    /// The in-place restore did not complete; the source may hold anonymized data
    #[error(
        "Restore of '{database}' failed: {reason}. Manual recovery required from backup {backup}"
    )]
    RestoreFailed {
        database: String,
        backup: String,
        reason: String,
    },

    /// The operator interrupted the run
    #[error("Run cancelled: {0}")]
    Cancelled(String),

    /// Database errors (connection, query, statement)
    #[error("Database error: {0}")]
    Database(String),

    /// Network/connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl DbAnonError {
    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DbAnonError::Configuration(_) => 2,
            DbAnonError::Connection(_) => 4,
            DbAnonError::RestoreFailed { .. } => 6,
            DbAnonError::Cancelled(_) => 130,
            _ => 5,
        }
    }

    /// Whether an operator must intervene before the source can be trusted again
    pub fn requires_manual_recovery(&self) -> bool {
        matches!(self, DbAnonError::RestoreFailed { .. })
    }

    /// Short machine-friendly name of the error kind, used in logs and summaries
    pub fn kind(&self) -> &'static str {
        match self {
            DbAnonError::Configuration(_) => "Configuration",
            DbAnonError::ExportFailed(_) => "ExportFailed",
            DbAnonError::ImportFailed(_) => "ImportFailed",
            DbAnonError::WorkingCopyCreateFailed { .. } => "WorkingCopyCreateFailed",
            DbAnonError::UniqueGenerationExhausted { .. } => "UniqueGenerationExhausted",
            DbAnonError::NoIdentitiesFound { .. } => "NoIdentitiesFound",
            DbAnonError::OperationTimedOut { .. } => "OperationTimedOut",
            DbAnonError::RestoreFailed { .. } => "RestoreFailed",
            DbAnonError::Cancelled(_) => "Cancelled",
            DbAnonError::Database(_) => "Database",
            DbAnonError::Connection(_) => "Connection",
            DbAnonError::Serialization(_) => "Serialization",
            DbAnonError::Io(_) => "Io",
        }
    }
}

/// Non-fatal condition recorded during a run
///
/// Warnings are reported in the summary but do not change the exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunWarning {
    /// An expected table was not present in a scope
    TableMissing { table: String },

    /// A single row update failed; the rest of the scope was still processed
    RowUpdateFailed {
        table: String,
        row_id: i64,
        reason: String,
    },

    /// A non-critical cleanup step failed (stray file, temporary database)
    CleanupFailed { resource: String, reason: String },
}

impl RunWarning {
    /// Short machine-friendly name of the warning kind
    pub fn kind(&self) -> &'static str {
        match self {
            RunWarning::TableMissing { .. } => "TableMissingWarning",
            RunWarning::RowUpdateFailed { .. } => "RowUpdateFailedWarning",
            RunWarning::CleanupFailed { .. } => "CleanupFailedWarning",
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::TableMissing { table } => {
                write!(f, "The table {table} does not exist")
            }
            RunWarning::RowUpdateFailed {
                table,
                row_id,
                reason,
            } => write!(f, "Failed to update row {row_id} in {table}: {reason}"),
            RunWarning::CleanupFailed { resource, reason } => {
                write!(f, "Failed to clean up {resource}: {reason}")
            }
        }
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for DbAnonError {
    fn from(err: std::io::Error) -> Self {
        DbAnonError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for DbAnonError {
    fn from(err: serde_json::Error) -> Self {
        DbAnonError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for DbAnonError {
    fn from(err: toml::de::Error) -> Self {
        DbAnonError::Configuration(format!("TOML parse error: {err}"))
    }
}
