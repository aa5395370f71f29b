//! Database abstraction layer
//!
//! Trait-based capabilities for database administration, row access and
//! dump/import, plus the factory that wires them from configuration.

pub mod factory;
pub mod traits;

pub use factory::{create_postgres_capabilities, Capabilities};
pub use traits::{
    AttributeTable, DatabaseBackend, DumpExecutor, IdentityRow, IdentityStore, IdentityTable,
    ImportExecutor,
};
