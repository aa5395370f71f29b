//! Database administration through the maintenance database

use crate::adapters::database::traits::{DatabaseBackend, IdentityStore};
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::DatabaseConfig;
use crate::domain::ids::{quote_ident, DatabaseName};
use crate::domain::{DbAnonError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// [`DatabaseBackend`] for a PostgreSQL server
///
/// `CREATE DATABASE` and `DROP DATABASE` run on a connection to
/// `database.admin_database`, never on the database being created or dropped.
pub struct PostgreSQLBackend {
    config: DatabaseConfig,
    admin: PostgreSQLClient,
}

impl PostgreSQLBackend {
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let admin_db = DatabaseName::new(config.admin_database.clone())
            .map_err(DbAnonError::Configuration)?;
        let admin = PostgreSQLClient::new(&config, &admin_db)?;
        Ok(Self { config, admin })
    }

    /// Verify that the server is reachable with the configured credentials
    pub async fn test_connection(&self) -> Result<()> {
        self.admin.test_connection().await
    }
}

#[async_trait]
impl DatabaseBackend for PostgreSQLBackend {
    async fn database_exists(&self, name: &DatabaseName) -> Result<bool> {
        let row = self
            .admin
            .query_opt(
                "SELECT 1 FROM pg_database WHERE datname = $1",
                &[&name.as_str()],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn create_database(&self, name: &DatabaseName) -> Result<()> {
        self.admin
            .batch_execute(&format!("CREATE DATABASE {}", quote_ident(name.as_str())))
            .await
    }

    async fn drop_database(&self, name: &DatabaseName) -> Result<()> {
        // FORCE terminates sessions still attached to the working copy
        self.admin
            .batch_execute(&format!(
                "DROP DATABASE IF EXISTS {} WITH (FORCE)",
                quote_ident(name.as_str())
            ))
            .await
    }

    async fn connect(&self, name: &DatabaseName) -> Result<Arc<dyn IdentityStore>> {
        let client = PostgreSQLClient::new(&self.config, name)?;
        client.test_connection().await?;
        Ok(Arc::new(PostgreSQLAdapter::new(client)))
    }
}
