//! External system integrations for dbanon.
//!
//! - [`database`] - capability traits and the factory that wires them
//! - [`postgresql`] - PostgreSQL backend and row-level store
//! - [`process`] - `pg_dump`/`psql` executors
//! - [`memory`] - in-memory cluster implementing every capability
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing without a database server:
//!
//! ```rust
//! use dbanon::adapters::database::Capabilities;
//! use dbanon::adapters::memory::{row, MemoryCluster};
//!
//! let cluster = MemoryCluster::new();
//! cluster.add_table("app", "wp_users", vec![row([("ID", "1")])]);
//! let capabilities = Capabilities::in_memory(&cluster);
//! # let _ = capabilities;
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
pub mod process;
