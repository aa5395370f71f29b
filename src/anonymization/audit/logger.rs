//! Audit logger for anonymized rows

use crate::anonymization::config::AuditConfig;
use crate::domain::{DbAnonError, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry<'a> {
    timestamp: String,
    scope: &'a str,
    table: &'a str,
    row_id: i64,
    fields: Vec<AuditField<'a>>,
}

/// One rewritten field (with hashed original)
#[derive(Debug, Serialize)]
struct AuditField<'a> {
    field: &'a str,
    /// SHA-256 hash of the original value (never log plaintext PII)
    original_hash: Option<String>,
}

/// Original value of a field that was replaced
pub struct ReplacedField<'a> {
    pub field: &'a str,
    pub original: Option<&'a str>,
}

/// Append-only audit trail of anonymized rows
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    // Serializes appends from concurrently processed scopes
    write_lock: Mutex<()>,
}

impl AuditLogger {
    /// Create a new audit logger, creating the log directory if needed
    pub fn new(config: &AuditConfig) -> Result<Self> {
        if let Some(parent) = config.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbAnonError::Io(format!(
                        "Failed to create audit log directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        Ok(Self {
            log_path: config.log_path.clone(),
            json_format: config.json_format,
            write_lock: Mutex::new(()),
        })
    }

    /// Record one anonymized row
    pub fn log_row(
        &self,
        scope: &str,
        table: &str,
        row_id: i64,
        fields: &[ReplacedField<'_>],
    ) -> Result<()> {
        let entry = AuditLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            scope,
            table,
            row_id,
            fields: fields
                .iter()
                .map(|f| AuditField {
                    field: f.field,
                    original_hash: f.original.map(hash_value),
                })
                .collect(),
        };

        self.write_entry(&entry)
    }

    fn write_entry(&self, entry: &AuditLogEntry<'_>) -> Result<()> {
        let line = if self.json_format {
            serde_json::to_string(entry)?
        } else {
            let fields: Vec<&str> = entry.fields.iter().map(|f| f.field).collect();
            format!(
                "[{}] Scope: {} | Table: {} | Row: {} | Fields: {}",
                entry.timestamp,
                entry.scope,
                entry.table,
                entry.row_id,
                fields.join(",")
            )
        };

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DbAnonError::Io("audit log lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| {
                DbAnonError::Io(format!(
                    "Failed to open audit log {}: {e}",
                    self.log_path.display()
                ))
            })?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

/// Hash a PII value using SHA-256
fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}
