//! In-memory database cluster
//!
//! Implements every pipeline capability without a server: databases are maps
//! of tables, tables are lists of text rows, and dumps are JSON files. Used by
//! the test suite, with hooks for injecting failures at each step.

use crate::adapters::database::traits::{
    AttributeTable, DatabaseBackend, DumpExecutor, IdentityRow, IdentityStore, IdentityTable,
    ImportExecutor,
};
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// One row: column name to text value (`None` is SQL NULL)
pub type MemoryRow = BTreeMap<String, Option<String>>;

/// Tables of one database, by physical name
pub type MemoryTables = BTreeMap<String, Vec<MemoryRow>>;

type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;
type Hook = Arc<dyn Fn() + Send + Sync>;

/// Builds a row from column/value pairs
///
/// ```
/// use dbanon::adapters::memory::row;
///
/// let user = row([("ID", "2"), ("user_login", "jdoe")]);
/// assert_eq!(user["user_login"].as_deref(), Some("jdoe"));
/// ```
pub fn row<const N: usize>(pairs: [(&str, &str); N]) -> MemoryRow {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Some(v.to_string())))
        .collect()
}

#[derive(Serialize, Deserialize)]
struct DumpFile {
    database: String,
    tables: MemoryTables,
}

#[derive(Default)]
struct Faults {
    dump: Option<NamePredicate>,
    import: Option<NamePredicate>,
    create: Option<NamePredicate>,
    drop: Option<NamePredicate>,
    row_updates: HashSet<(String, i64)>,
    after_identity_batch: Option<Hook>,
}

#[derive(Default)]
struct ClusterState {
    databases: BTreeMap<String, MemoryTables>,
    faults: Faults,
    writes: usize,
    log: Vec<String>,
}

/// Shared in-memory cluster; clones refer to the same state
#[derive(Clone, Default)]
pub struct MemoryCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterState> {
        // A poisoned lock only means a test thread panicked; the data is still usable
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an empty database if it does not exist yet
    pub fn add_database(&self, name: &str) {
        self.lock().databases.entry(name.to_string()).or_default();
    }

    /// Create or replace a table, creating the database if needed
    pub fn add_table(&self, database: &str, table: &str, rows: Vec<MemoryRow>) {
        self.lock()
            .databases
            .entry(database.to_string())
            .or_default()
            .insert(table.to_string(), rows);
    }

    /// Copy of one table, `None` if the database or table is absent
    pub fn table(&self, database: &str, table: &str) -> Option<Vec<MemoryRow>> {
        self.lock()
            .databases
            .get(database)
            .and_then(|tables| tables.get(table))
            .cloned()
    }

    /// Copy of all tables of a database
    pub fn tables(&self, database: &str) -> Option<MemoryTables> {
        self.lock().databases.get(database).cloned()
    }

    pub fn database_names(&self) -> Vec<String> {
        self.lock().databases.keys().cloned().collect()
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.lock().databases.contains_key(name)
    }

    /// Number of mutating operations performed so far
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Chronological log of administrative operations (`create`, `drop`, `dump`, `import`)
    pub fn operations(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn fail_dump_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.lock().faults.dump = Some(Arc::new(predicate));
    }

    pub fn fail_import_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.lock().faults.import = Some(Arc::new(predicate));
    }

    pub fn fail_create_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.lock().faults.create = Some(Arc::new(predicate));
    }

    pub fn fail_drop_when(&self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) {
        self.lock().faults.drop = Some(Arc::new(predicate));
    }

    /// Make every update of row `id` in `table` fail
    pub fn fail_row_update(&self, table: &str, id: i64) {
        self.lock()
            .faults
            .row_updates
            .insert((table.to_string(), id));
    }

    /// Run `hook` after every identity page is read
    pub fn after_identity_batch(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.lock().faults.after_identity_batch = Some(Arc::new(hook));
    }

    fn matches(predicate: &Option<NamePredicate>, name: &str) -> bool {
        predicate.as_ref().is_some_and(|p| p(name))
    }
}

fn parse_id(row: &MemoryRow, column: &str) -> Option<i64> {
    row.get(column)
        .and_then(|v| v.as_deref())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl DatabaseBackend for MemoryCluster {
    async fn database_exists(&self, name: &DatabaseName) -> Result<bool> {
        Ok(self.has_database(name.as_str()))
    }

    async fn create_database(&self, name: &DatabaseName) -> Result<()> {
        let mut state = self.lock();
        if Self::matches(&state.faults.create, name.as_str()) {
            return Err(DbAnonError::Database(format!(
                "permission denied to create database \"{name}\""
            )));
        }
        if state.databases.contains_key(name.as_str()) {
            return Err(DbAnonError::Database(format!(
                "database \"{name}\" already exists"
            )));
        }
        state.databases.insert(name.to_string(), MemoryTables::new());
        state.writes += 1;
        state.log.push(format!("create {name}"));
        Ok(())
    }

    async fn drop_database(&self, name: &DatabaseName) -> Result<()> {
        let mut state = self.lock();
        if Self::matches(&state.faults.drop, name.as_str()) {
            return Err(DbAnonError::Database(format!(
                "database \"{name}\" is being accessed by other users"
            )));
        }
        state.databases.remove(name.as_str());
        state.writes += 1;
        state.log.push(format!("drop {name}"));
        Ok(())
    }

    async fn connect(&self, name: &DatabaseName) -> Result<Arc<dyn IdentityStore>> {
        if !self.has_database(name.as_str()) {
            return Err(DbAnonError::Connection(format!(
                "database \"{name}\" does not exist"
            )));
        }
        Ok(Arc::new(MemoryStore {
            cluster: self.clone(),
            database: name.to_string(),
        }))
    }
}

#[async_trait]
impl DumpExecutor for MemoryCluster {
    async fn dump(&self, database: &DatabaseName, target: &Path) -> Result<()> {
        let bytes = {
            let mut state = self.lock();
            if Self::matches(&state.faults.dump, database.as_str()) {
                return Err(DbAnonError::ExportFailed(format!(
                    "pg_dump: error: connection to database \"{database}\" failed"
                )));
            }
            let tables = state.databases.get(database.as_str()).cloned().ok_or_else(|| {
                DbAnonError::ExportFailed(format!("database \"{database}\" does not exist"))
            })?;
            state.log.push(format!("dump {database}"));
            serde_json::to_vec_pretty(&DumpFile {
                database: database.to_string(),
                tables,
            })?
        };

        tokio::fs::write(target, bytes)
            .await
            .map_err(|e| DbAnonError::ExportFailed(format!("{}: {e}", target.display())))
    }
}

#[async_trait]
impl ImportExecutor for MemoryCluster {
    async fn import(&self, database: &DatabaseName, source: &Path) -> Result<()> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| DbAnonError::ImportFailed(format!("{}: {e}", source.display())))?;
        let dump: DumpFile = serde_json::from_slice(&bytes)
            .map_err(|e| DbAnonError::ImportFailed(format!("corrupt dump: {e}")))?;

        let mut state = self.lock();
        if Self::matches(&state.faults.import, database.as_str()) {
            return Err(DbAnonError::ImportFailed(format!(
                "psql: error: import into \"{database}\" aborted"
            )));
        }
        let tables = state.databases.get_mut(database.as_str()).ok_or_else(|| {
            DbAnonError::ImportFailed(format!("database \"{database}\" does not exist"))
        })?;
        // Dumps drop and recreate every object they contain
        for (name, rows) in dump.tables {
            tables.insert(name, rows);
        }
        state.writes += 1;
        state.log.push(format!("import {database}"));
        Ok(())
    }
}

/// Row-level view of one in-memory database
pub struct MemoryStore {
    cluster: MemoryCluster,
    database: String,
}

impl MemoryStore {
    fn with_table<T>(
        &self,
        table: &str,
        f: impl FnOnce(&mut Vec<MemoryRow>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.cluster.lock();
        let rows = state
            .databases
            .get_mut(&self.database)
            .ok_or_else(|| {
                DbAnonError::Connection(format!("database \"{}\" does not exist", self.database))
            })?
            .get_mut(table)
            .ok_or_else(|| {
                DbAnonError::Database(format!("relation \"{table}\" does not exist"))
            })?;
        f(rows)
    }

    fn record_write(&self) {
        self.cluster.lock().writes += 1;
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self
            .cluster
            .lock()
            .databases
            .get(&self.database)
            .is_some_and(|tables| tables.contains_key(table)))
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.with_table(table, |rows| Ok(rows.len() as u64))
    }

    async fn tenant_ids(&self, registry_table: &str, id_column: &str) -> Result<Vec<i64>> {
        self.with_table(registry_table, |rows| {
            let ids: BTreeSet<i64> = rows.iter().filter_map(|r| parse_id(r, id_column)).collect();
            Ok(ids.into_iter().collect())
        })
    }

    async fn identity_batch(
        &self,
        table: &IdentityTable,
        columns: &[String],
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<IdentityRow>> {
        let batch = self.with_table(&table.name, |rows| {
            let mut selected: Vec<(i64, &MemoryRow)> = rows
                .iter()
                .filter_map(|r| parse_id(r, &table.key).map(|id| (id, r)))
                .filter(|(id, _)| *id > after_id)
                .collect();
            selected.sort_by_key(|(id, _)| *id);
            Ok(selected
                .into_iter()
                .take(limit)
                .map(|(id, r)| IdentityRow {
                    id,
                    values: columns.iter().map(|c| r.get(c).cloned().flatten()).collect(),
                })
                .collect::<Vec<_>>())
        })?;

        let hook = self.cluster.lock().faults.after_identity_batch.clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(batch)
    }

    async fn update_identity(
        &self,
        table: &IdentityTable,
        id: i64,
        values: &[(String, String)],
    ) -> Result<u64> {
        if self
            .cluster
            .lock()
            .faults
            .row_updates
            .contains(&(table.name.clone(), id))
        {
            return Err(DbAnonError::Database(format!(
                "could not update row {id} of \"{}\"",
                table.name
            )));
        }

        let affected = self.with_table(&table.name, |rows| {
            let mut affected = 0;
            for r in rows.iter_mut().filter(|r| parse_id(r, &table.key) == Some(id)) {
                for (column, value) in values {
                    r.insert(column.clone(), Some(value.clone()));
                }
                affected += 1;
            }
            Ok(affected)
        })?;
        self.record_write();
        Ok(affected)
    }

    async fn attribute_owners(
        &self,
        table: &AttributeTable,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>> {
        self.with_table(&table.name, |rows| {
            let owners: BTreeSet<i64> = rows
                .iter()
                .filter_map(|r| parse_id(r, &table.owner_column))
                .filter(|id| *id > after_id)
                .collect();
            Ok(owners.into_iter().take(limit).collect())
        })
    }

    async fn attribute_value(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
    ) -> Result<Option<String>> {
        self.with_table(&table.name, |rows| {
            Ok(rows
                .iter()
                .find(|r| {
                    parse_id(r, &table.owner_column) == Some(owner)
                        && r.get(&table.key_column).cloned().flatten().as_deref() == Some(key)
                })
                .map(|r| r.get(&table.value_column).cloned().flatten().unwrap_or_default()))
        })
    }

    async fn update_attribute(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
        value: &str,
    ) -> Result<u64> {
        if self
            .cluster
            .lock()
            .faults
            .row_updates
            .contains(&(table.name.clone(), owner))
        {
            return Err(DbAnonError::Database(format!(
                "could not update attribute {key} of owner {owner} in \"{}\"",
                table.name
            )));
        }

        let affected = self.with_table(&table.name, |rows| {
            let mut affected = 0;
            for r in rows.iter_mut().filter(|r| {
                parse_id(r, &table.owner_column) == Some(owner)
                    && r.get(&table.key_column).cloned().flatten().as_deref() == Some(key)
            }) {
                r.insert(table.value_column.clone(), Some(value.to_string()));
                affected += 1;
            }
            Ok(affected)
        })?;
        self.record_write();
        Ok(affected)
    }
}
