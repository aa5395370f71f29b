//! Capability factory
//!
//! Bundles the backend, dump and import capabilities a pipeline run needs and
//! builds them from configuration.

use crate::adapters::database::traits::{DatabaseBackend, DumpExecutor, ImportExecutor};
use crate::adapters::memory::MemoryCluster;
use crate::adapters::postgresql::PostgreSQLBackend;
use crate::adapters::process::ProcessExecutor;
use crate::config::schema::DbAnonConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Everything the pipeline needs to reach the outside world
#[derive(Clone)]
pub struct Capabilities {
    pub backend: Arc<dyn DatabaseBackend>,
    pub dump: Arc<dyn DumpExecutor>,
    pub import: Arc<dyn ImportExecutor>,
}

impl Capabilities {
    /// Serve every capability from one in-memory cluster
    pub fn in_memory(cluster: &MemoryCluster) -> Self {
        Self {
            backend: Arc::new(cluster.clone()),
            dump: Arc::new(cluster.clone()),
            import: Arc::new(cluster.clone()),
        }
    }
}

/// Create PostgreSQL-backed capabilities from the configuration
///
/// No connection is opened here; the first query does that.
///
/// # Errors
///
/// Returns an error if the admin connection pool cannot be built
pub fn create_postgres_capabilities(config: &DbAnonConfig) -> Result<Capabilities> {
    tracing::debug!(
        host = %config.database.host,
        port = config.database.port,
        "Creating PostgreSQL backend"
    );
    let backend = PostgreSQLBackend::new(config.database.clone())?;
    let executor = Arc::new(ProcessExecutor::from_config(config));

    Ok(Capabilities {
        backend: Arc::new(backend),
        dump: executor.clone(),
        import: executor,
    })
}
