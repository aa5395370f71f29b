//! Database abstraction traits
//!
//! The pipeline talks to the relational store and to the dump/import
//! utilities only through these capabilities. The PostgreSQL adapter and the
//! process executor implement them for production; the in-memory cluster
//! implements them for tests.

use crate::domain::ids::DatabaseName;
use crate::domain::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Physical layout of an identity table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityTable {
    /// Physical table name, prefix included
    pub name: String,
    /// Integer primary key column
    pub key: String,
}

/// Physical layout of a key/value attribute table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTable {
    /// Physical table name, prefix included
    pub name: String,
    /// Column referencing the identity key
    pub owner_column: String,
    pub key_column: String,
    pub value_column: String,
}

/// One identity row as read for anonymization
///
/// `values` follows the order of the columns requested from
/// [`IdentityStore::identity_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRow {
    pub id: i64,
    pub values: Vec<Option<String>>,
}

/// Row-level access to one database
///
/// Table and column names are expected to be validated identifiers; all
/// values are bound as statement parameters.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Check whether a table exists in the connected database
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Count the rows of a table
    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// List tenant ids from the tenant registry table, ascending
    async fn tenant_ids(&self, registry_table: &str, id_column: &str) -> Result<Vec<i64>>;

    /// Fetch the next page of identity rows with `key > after_id`, ascending by key
    async fn identity_batch(
        &self,
        table: &IdentityTable,
        columns: &[String],
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<IdentityRow>>;

    /// Update the given columns of one identity row, returning affected rows
    async fn update_identity(
        &self,
        table: &IdentityTable,
        id: i64,
        values: &[(String, String)],
    ) -> Result<u64>;

    /// Fetch the next page of distinct attribute owners with `owner > after_id`
    async fn attribute_owners(
        &self,
        table: &AttributeTable,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>>;

    /// Current value of one attribute, `None` when the attribute row is absent
    async fn attribute_value(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
    ) -> Result<Option<String>>;

    /// Overwrite one attribute value, returning affected rows
    async fn update_attribute(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
        value: &str,
    ) -> Result<u64>;
}

/// Database-level administration (create, drop, connect)
#[async_trait]
pub trait DatabaseBackend: Send + Sync {
    async fn database_exists(&self, name: &DatabaseName) -> Result<bool>;

    async fn create_database(&self, name: &DatabaseName) -> Result<()>;

    async fn drop_database(&self, name: &DatabaseName) -> Result<()>;

    /// Open row-level access to a database
    async fn connect(&self, name: &DatabaseName) -> Result<Arc<dyn IdentityStore>>;
}

/// Writes a full, self-contained dump of a database to a file
///
/// The dump must be restorable over an existing copy of the database by the
/// matching [`ImportExecutor`] (it drops objects before recreating them).
#[async_trait]
pub trait DumpExecutor: Send + Sync {
    async fn dump(&self, database: &DatabaseName, target: &Path) -> Result<()>;
}

/// Loads a dump file into a database
#[async_trait]
pub trait ImportExecutor: Send + Sync {
    async fn import(&self, database: &DatabaseName, source: &Path) -> Result<()>;
}
