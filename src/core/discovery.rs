//! Schema discovery
//!
//! Finds the tenant scopes of a database. A single-tenant database has one
//! root scope using the base prefix. A multi-tenant database always has the
//! main tenant's scope on the base prefix, plus one scope per other row of
//! the tenant registry using `<base><id>_`.

use crate::adapters::database::traits::IdentityStore;
use crate::config::schema::{SchemaConfig, Tenancy};
use crate::domain::ids::{DatabaseName, TablePrefix};
use crate::domain::{DbAnonError, Result, Scope};
use std::collections::HashSet;

pub struct SchemaDiscovery {
    database: DatabaseName,
    base: TablePrefix,
    schema: SchemaConfig,
}

impl SchemaDiscovery {
    pub fn new(database: DatabaseName, schema: &SchemaConfig) -> Result<Self> {
        let base =
            TablePrefix::new(schema.table_prefix.clone()).map_err(DbAnonError::Configuration)?;
        Ok(Self {
            database,
            base,
            schema: schema.clone(),
        })
    }

    /// Enumerate the scopes to anonymize, in tenant order
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Multi-tenant mode is configured without a tenant registry table
    /// - The registry cannot be read
    /// - A tenant id yields an invalid table prefix
    pub async fn discover_scopes(&self, store: &dyn IdentityStore) -> Result<Vec<Scope>> {
        let registry = self.base.table(&self.schema.tenant_registry_table);

        let multi = match self.schema.tenancy {
            Tenancy::Single => false,
            Tenancy::Multi => {
                if !store.table_exists(&registry).await? {
                    return Err(DbAnonError::Configuration(format!(
                        "schema.tenancy is multi but tenant registry {registry} does not exist"
                    )));
                }
                true
            }
            Tenancy::Auto => store.table_exists(&registry).await?,
        };

        if !multi {
            tracing::info!(database = %self.database, prefix = %self.base, "Single-tenant database");
            return Ok(vec![Scope::root(self.database.clone(), self.base.clone())]);
        }

        // The base prefix always holds the main site's tables, whether or not
        // the registry lists the main tenant
        let mut scopes = vec![Scope::tenant(
            self.database.clone(),
            self.base.clone(),
            self.schema.main_tenant_id,
        )];
        let mut prefixes: HashSet<String> = HashSet::from([self.base.as_str().to_string()]);

        let ids = store
            .tenant_ids(&registry, &self.schema.tenant_id_column)
            .await?;
        if ids.is_empty() {
            tracing::warn!(registry = %registry, "Tenant registry is empty");
        }

        for id in ids {
            if id == self.schema.main_tenant_id {
                continue;
            }
            let prefix = self.base.for_tenant(id).map_err(DbAnonError::Configuration)?;
            if prefixes.insert(prefix.as_str().to_string()) {
                scopes.push(Scope::tenant(self.database.clone(), prefix, id));
            }
        }

        tracing::info!(
            database = %self.database,
            tenants = scopes.len(),
            "Multi-tenant database"
        );
        Ok(scopes)
    }
}

/// Whether the physical table for `logical` exists in `scope`
pub async fn table_exists(store: &dyn IdentityStore, scope: &Scope, logical: &str) -> Result<bool> {
    store.table_exists(&scope.table(logical)).await
}
