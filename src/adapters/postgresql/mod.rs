//! PostgreSQL database integration
//!
//! This module provides the production implementations of the row-level
//! store and the database backend.

pub mod adapter;
pub mod backend;
pub mod client;

pub use adapter::PostgreSQLAdapter;
pub use backend::PostgreSQLBackend;
pub use client::PostgreSQLClient;
