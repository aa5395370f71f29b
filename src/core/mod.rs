//! Core business logic for dbanon.
//!
//! # Modules
//!
//! - [`snapshot`] - Dumps a database to a file
//! - [`working_copy`] - Creates, restores and tears down the mutated database
//! - [`discovery`] - Finds tenant scopes and their tables
//! - [`cleanup`] - Finalizes a run on every exit path
//! - [`pipeline`] - Sequences a run as a state machine
//! - [`summary`] - Run summary and reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use dbanon::adapters::database::create_postgres_capabilities;
//! use dbanon::anonymization::FakeGenerator;
//! use dbanon::config::load_config;
//! use dbanon::core::PipelineOrchestrator;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("dbanon.toml")?;
//! let capabilities = create_postgres_capabilities(&config)?;
//!
//! // Create shutdown signal
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! let orchestrator = PipelineOrchestrator::new(
//!     config,
//!     capabilities,
//!     Arc::new(FakeGenerator::new()),
//!     shutdown_rx,
//! );
//! let summary = orchestrator.run().await?;
//!
//! println!("Anonymized: {}", summary.report.rows_anonymized);
//! # Ok(())
//! # }
//! ```

pub mod cleanup;
pub mod discovery;
pub mod pipeline;
pub mod snapshot;
pub mod summary;
pub mod working_copy;

pub use cleanup::{finalize, CleanupPlan, FinalizeReport, RunOutcome};
pub use discovery::SchemaDiscovery;
pub use pipeline::{PipelineOrchestrator, PipelineState, RunContext};
pub use snapshot::{ExportOutcome, SnapshotService};
pub use summary::RunSummary;
pub use working_copy::{ReleaseOutcome, WorkingCopyHandle, WorkingCopyManager};
