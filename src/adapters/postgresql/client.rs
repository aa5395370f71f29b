//! PostgreSQL client implementation
//!
//! Thin wrapper around a `deadpool-postgres` pool bound to one database. Every
//! call carries the configured statement timeout, both on the server side and
//! as a client-side deadline.

use crate::config::schema::DatabaseConfig;
use crate::domain::ids::DatabaseName;
use crate::domain::{DbAnonError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use secrecy::ExposeSecret;
use std::future::Future;
use std::time::Duration;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

/// Extra time granted on top of the server-side statement timeout before the
/// client gives up on its own
const CLIENT_DEADLINE_SLACK: Duration = Duration::from_secs(5);

/// PostgreSQL client for dbanon
pub struct PostgreSQLClient {
    pool: Pool,
    database: DatabaseName,
    host: String,
    port: u16,
    statement_timeout: Duration,
}

impl PostgreSQLClient {
    /// Create a new client for `database` using the connection settings of `config`
    ///
    /// No connection is opened until the first query.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be built.
    pub fn new(config: &DatabaseConfig, database: &DatabaseName) -> Result<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .user(&config.user)
            .dbname(database.as_str())
            .application_name("dbanon")
            .connect_timeout(config.connection_timeout());

        let password = config.password.expose_secret();
        if !password.is_empty() {
            pg_config.password(password.as_str());
        }

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig {
                recycling_method: RecyclingMethod::Fast,
            },
        );

        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(config.connection_timeout()))
            .create_timeout(Some(config.connection_timeout()))
            .recycle_timeout(Some(config.connection_timeout()))
            .build()
            .map_err(|e| DbAnonError::Database(format!("Failed to create connection pool: {e}")))?;

        Ok(Self {
            pool,
            database: database.clone(),
            host: config.host.clone(),
            port: config.port,
            statement_timeout: config.statement_timeout(),
        })
    }

    /// Database this client is bound to
    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        self.query("SELECT 1", &[]).await?;
        tracing::debug!(database = %self.database, "PostgreSQL connection test successful");
        Ok(())
    }

    /// Get a connection from the pool with the statement timeout applied
    async fn get_connection(&self) -> Result<deadpool_postgres::Object> {
        let client = self.pool.get().await.map_err(|e| {
            DbAnonError::Connection(format!(
                "Failed to connect to {}:{}/{}: {}",
                self.host, self.port, self.database, e
            ))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.statement_timeout.as_millis()
        );
        client.batch_execute(&timeout_query).await.map_err(|e| {
            DbAnonError::Database(format!("Failed to set statement timeout: {e}"))
        })?;

        Ok(client)
    }

    async fn with_deadline<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.statement_timeout + CLIENT_DEADLINE_SLACK;
        match tokio::time::timeout(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(DbAnonError::OperationTimedOut {
                operation: format!("{operation} on {}", self.database),
                timeout: deadline,
            }),
        }
    }

    /// Execute a query and return rows
    pub async fn query(&self, query: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>> {
        self.with_deadline("query", async {
            let client = self.get_connection().await?;
            client
                .query(query, params)
                .await
                .map_err(|e| DbAnonError::Database(format!("Query failed: {e}")))
        })
        .await
    }

    /// Execute a query expected to return at most one row
    pub async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>> {
        self.with_deadline("query", async {
            let client = self.get_connection().await?;
            client
                .query_opt(query, params)
                .await
                .map_err(|e| DbAnonError::Database(format!("Query failed: {e}")))
        })
        .await
    }

    /// Execute a statement and return the number of affected rows
    pub async fn execute(&self, statement: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64> {
        self.with_deadline("statement", async {
            let client = self.get_connection().await?;
            client
                .execute(statement, params)
                .await
                .map_err(|e| DbAnonError::Database(format!("Statement execution failed: {e}")))
        })
        .await
    }

    /// Execute parameterless SQL through the simple query protocol
    ///
    /// Needed for statements that cannot run inside the implicit transaction of
    /// the extended protocol, such as `CREATE DATABASE`.
    pub async fn batch_execute(&self, sql: &str) -> Result<()> {
        self.with_deadline("statement", async {
            let client = self.get_connection().await?;
            client
                .batch_execute(sql)
                .await
                .map_err(|e| DbAnonError::Database(format!("Statement execution failed: {e}")))
        })
        .await
    }

    /// Connection target without credentials, safe for logs
    pub fn connection_string_safe(&self) -> String {
        format!("postgresql://***@{}:{}/{}", self.host, self.port, self.database)
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}
