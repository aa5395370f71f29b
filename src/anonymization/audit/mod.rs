//! Audit logging module
//!
//! Records which rows were anonymized, with SHA-256 hashes in place of the
//! original values.

pub mod logger;

pub use logger::{AuditLogger, ReplacedField};
