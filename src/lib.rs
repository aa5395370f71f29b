// DbAnon - PII anonymization pipeline for PostgreSQL
// Copyright (c) 2025 DbAnon Contributors
// Licensed under the MIT License

//! # DbAnon - anonymized snapshots of PostgreSQL databases
//!
//! DbAnon produces a SQL dump of a database in which personally identifying
//! data has been replaced with realistic synthetic values, while the source
//! database ends the run exactly as it started.
//!
//! ## Overview
//!
//! A run goes through these steps:
//! - **Export** the source database with `pg_dump`
//! - **Acquire** a working copy: a fresh `<name>_temp_<timestamp>` database
//!   (isolated copy) or the source itself (in place, restored afterwards)
//! - **Anonymize** identity rows and their attribute rows, per tenant scope
//! - **Export** the anonymized working copy
//! - **Finalize**: drop the working copy or restore the source, then remove
//!   intermediate files
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline orchestration, discovery, working copy, cleanup
//! - [`anonymization`] - Value generators, uniqueness pools, the engine
//! - [`adapters`] - PostgreSQL, external tools and an in-memory backend
//! - [`domain`] - Identifiers, scopes, errors, warnings
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dbanon::adapters::database::create_postgres_capabilities;
//! use dbanon::anonymization::FakeGenerator;
//! use dbanon::config::load_config;
//! use dbanon::core::PipelineOrchestrator;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("dbanon.toml")?;
//!     let capabilities = create_postgres_capabilities(&config)?;
//!     let (_tx, shutdown) = watch::channel(false);
//!
//!     let orchestrator = PipelineOrchestrator::new(
//!         config,
//!         capabilities,
//!         Arc::new(FakeGenerator::new()),
//!         shutdown,
//!     );
//!     let summary = orchestrator.run().await?;
//!
//!     println!("Anonymized {} rows", summary.report.rows_anonymized);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::DbAnonError`]; each variant
//! maps to a process exit code through `exit_code()`.

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
