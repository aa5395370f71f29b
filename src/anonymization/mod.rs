//! Anonymization module
//!
//! Replaces the PII held in identity and attribute tables with synthetic
//! values.
//!
//! # Architecture
//!
//! - **Rules** ([`config`]): which columns and attribute keys are rewritten,
//!   with which generator, and which identities are protected
//! - **Generation** ([`anonymizer`]): the `fake`-backed [`ValueGenerator`]
//!   and the per-run [`UniquePool`]
//! - **Engine** ([`engine`]): keyset-paginated, row-by-row application of
//!   the rules to one scope
//! - **Audit** ([`audit`]): optional log of rewritten rows with hashed
//!   originals

pub mod anonymizer;
pub mod audit;
pub mod config;
pub mod engine;
pub mod report;

// Re-export main types
pub use anonymizer::{FakeGenerator, UniquePool, ValueGenerator};
pub use config::{AnonymizationConfig, AnonymizationRule, GeneratorKind};
pub use engine::AnonymizationEngine;
pub use report::AnonymizationReport;
