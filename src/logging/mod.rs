//! Logging and observability
//!
//! Structured logging with configurable levels, console output and an
//! optional rotating JSON file.
//!
//! # Example
//!
//! ```no_run
//! use dbanon::logging::init_logging;
//! use dbanon::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a pipeline step
///
/// # Example
///
/// ```no_run
/// use dbanon::log_step_start;
///
/// log_step_start!("export", "wordpress");
/// ```
#[macro_export]
macro_rules! log_step_start {
    ($step:expr, $database:expr) => {
        tracing::info!(
            step = %$step,
            database = %$database,
            "Starting step"
        );
    };
}

/// Log the completion of a pipeline step
///
/// # Example
///
/// ```no_run
/// use dbanon::log_step_complete;
/// use std::time::Instant;
///
/// let started = Instant::now();
/// log_step_complete!("export", started.elapsed());
/// ```
#[macro_export]
macro_rules! log_step_complete {
    ($step:expr, $duration:expr) => {
        tracing::info!(
            step = %$step,
            duration_ms = $duration.as_millis() as u64,
            "Step completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use dbanon::log_error_with_context;
/// use dbanon::domain::DbAnonError;
///
/// let error = DbAnonError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
