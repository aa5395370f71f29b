//! Error context extension trait
//!
//! Like `anyhow::Context`, but the error keeps its [`DbAnonError`] kind, so
//! exit codes and recovery hints survive the added context.
//!
//! ```rust
//! use dbanon::domain::{DbAnonError, Result};
//! use dbanon::domain::context::ResultExt;
//!
//! fn read_dump(path: &str) -> Result<Vec<u8>> {
//!     std::fs::read(path).with_context(|| format!("Failed to read dump {path}"))
//! }
//! ```

use crate::domain::errors::DbAnonError;
use crate::domain::result::Result;
use std::fmt::Display;

/// Extension trait for adding context to `Result` types
pub trait ResultExt<T> {
    /// Add context to an error (evaluated eagerly)
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display;

    /// Add context to an error, computing it only on failure
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DbAnonError>,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display,
    {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

impl DbAnonError {
    /// Prefix the message of this error with `context`, keeping its kind
    ///
    /// Structured variants carry their own context and are returned unchanged.
    pub fn with_context(self, context: impl Display) -> Self {
        let wrap = |msg: String| format!("{context}: {msg}");
        match self {
            DbAnonError::Configuration(m) => DbAnonError::Configuration(wrap(m)),
            DbAnonError::ExportFailed(m) => DbAnonError::ExportFailed(wrap(m)),
            DbAnonError::ImportFailed(m) => DbAnonError::ImportFailed(wrap(m)),
            DbAnonError::Cancelled(m) => DbAnonError::Cancelled(wrap(m)),
            DbAnonError::Database(m) => DbAnonError::Database(wrap(m)),
            DbAnonError::Connection(m) => DbAnonError::Connection(wrap(m)),
            DbAnonError::Serialization(m) => DbAnonError::Serialization(wrap(m)),
            DbAnonError::Io(m) => DbAnonError::Io(wrap(m)),
            other => other,
        }
    }
}
