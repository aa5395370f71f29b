//! Value generation for anonymized fields
//!
//! [`ValueGenerator`] produces synthetic values by [`GeneratorKind`];
//! [`UniquePool`] guarantees that unique fields never repeat within a run.

pub mod faker;
pub mod unique;

use crate::anonymization::config::GeneratorKind;

pub use faker::FakeGenerator;
pub use unique::UniquePool;

/// Source of synthetic values
///
/// Implementations must be shareable across concurrently processed scopes.
pub trait ValueGenerator: Send + Sync {
    /// Produce one syntactically valid value of the given kind
    fn generate(&self, kind: GeneratorKind) -> String;
}
