//! Main anonymization engine
//!
//! [`AnonymizationEngine`] rewrites the PII of one scope at a time:
//!
//! 1. identity rows are read in keyset-paginated chunks and every declared
//!    identity field is replaced, one parameterized `UPDATE` per row;
//! 2. the attribute table is walked by owner, and each declared attribute key
//!    that is present is replaced.
//!
//! Protected identities are skipped in both steps. Values of unique fields
//! come from a [`UniquePool`] shared by every scope of the run. Cancellation
//! is honored between chunks, never inside a row.

use crate::adapters::database::traits::{AttributeTable, IdentityStore, IdentityTable};
use crate::anonymization::anonymizer::{UniquePool, ValueGenerator};
use crate::anonymization::audit::{AuditLogger, ReplacedField};
use crate::anonymization::config::{AnonymizationConfig, AnonymizationRule};
use crate::anonymization::report::AnonymizationReport;
use crate::config::schema::{DbAnonConfig, SchemaConfig};
use crate::domain::{DbAnonError, Result, RunWarning, Scope};
use std::sync::Arc;
use tokio::sync::watch;

/// Lowest key handed to the first keyset page
const KEYSET_START: i64 = i64::MIN;

/// Applies the anonymization rules to the tables of a scope
///
/// The engine is shared by concurrently processed scopes; all of its state is
/// either immutable or behind the [`UniquePool`]'s lock.
pub struct AnonymizationEngine {
    rules: AnonymizationConfig,
    schema: SchemaConfig,
    generator: Arc<dyn ValueGenerator>,
    pool: Arc<UniquePool>,
    audit_logger: Option<AuditLogger>,
    batch_size: usize,
    shutdown: Option<watch::Receiver<bool>>,
}

impl AnonymizationEngine {
    /// Create a new engine for one run
    ///
    /// # Errors
    ///
    /// Returns an error if the anonymization rules are invalid or the audit
    /// log cannot be prepared.
    pub fn new(config: &DbAnonConfig, generator: Arc<dyn ValueGenerator>) -> Result<Self> {
        config
            .anonymization
            .validate()
            .map_err(DbAnonError::Configuration)?;

        let audit_logger = if config.anonymization.audit.enabled {
            Some(AuditLogger::new(&config.anonymization.audit)?)
        } else {
            None
        };

        Ok(Self {
            rules: config.anonymization.clone(),
            schema: config.schema.clone(),
            generator,
            pool: Arc::new(UniquePool::new(config.anonymization.max_unique_attempts)),
            audit_logger,
            batch_size: config.pipeline.batch_size.max(1),
            shutdown: None,
        })
    }

    /// Stop between chunks once `shutdown` turns `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// The run's uniqueness pool
    pub fn unique_pool(&self) -> &UniquePool {
        &self.pool
    }

    /// Anonymize the identity and attribute tables of `scope`
    ///
    /// Missing tables and failed row updates are recorded as warnings in the
    /// report.
    ///
    /// # Arguments
    ///
    /// * `store` - Connection to the working copy
    /// * `scope` - Table prefix and tenant to process
    ///
    /// # Errors
    ///
    /// - [`DbAnonError::NoIdentitiesFound`] for a root scope (single-tenant
    ///   run) whose identity table exists but is empty
    /// - [`DbAnonError::Cancelled`] when shutdown is requested between pages
    /// - [`DbAnonError::UniqueGenerationExhausted`] when no fresh unique value
    ///   can be generated
    /// - Any error reading the tables
    pub async fn anonymize_scope(
        &self,
        store: &dyn IdentityStore,
        scope: &Scope,
    ) -> Result<AnonymizationReport> {
        let mut report = AnonymizationReport::new();
        let identity = IdentityTable {
            name: scope.table(&self.schema.identity_table),
            key: self.schema.identity_key.clone(),
        };

        if !store.table_exists(&identity.name).await? {
            report.record_warning(RunWarning::TableMissing {
                table: identity.name,
            });
            return Ok(report);
        }

        if scope.tenant_id.is_none() && store.count_rows(&identity.name).await? == 0 {
            return Err(DbAnonError::NoIdentitiesFound {
                table: identity.name,
            });
        }

        self.anonymize_identities(store, scope, &identity, &mut report)
            .await?;

        let attributes = AttributeTable {
            name: scope.table(&self.schema.attribute_table),
            owner_column: self.schema.attribute_owner_column.clone(),
            key_column: self.schema.attribute_key_column.clone(),
            value_column: self.schema.attribute_value_column.clone(),
        };

        if !self.rules.attribute_keys.is_empty() {
            if store.table_exists(&attributes.name).await? {
                self.anonymize_attributes(store, scope, &attributes, &mut report)
                    .await?;
            } else {
                report.record_warning(RunWarning::TableMissing {
                    table: attributes.name,
                });
            }
        }

        report.log_summary(&scope.to_string());
        Ok(report)
    }

    async fn anonymize_identities(
        &self,
        store: &dyn IdentityStore,
        scope: &Scope,
        table: &IdentityTable,
        report: &mut AnonymizationReport,
    ) -> Result<()> {
        if self.rules.identity_fields.is_empty() {
            return Ok(());
        }
        let columns: Vec<String> = self
            .rules
            .identity_fields
            .iter()
            .map(|r| r.field.clone())
            .collect();

        let mut after = KEYSET_START;
        loop {
            self.check_cancelled(scope)?;

            let batch = store
                .identity_batch(table, &columns, after, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = last.id;
            let exhausted = batch.len() < self.batch_size;

            tracing::debug!(
                scope = %scope,
                table = %table.name,
                rows = batch.len(),
                "Identity chunk read"
            );

            for row in batch {
                report.rows_seen += 1;
                if self.rules.is_protected(row.id) {
                    report.rows_protected += 1;
                    continue;
                }

                let mut values = Vec::with_capacity(columns.len());
                for rule in &self.rules.identity_fields {
                    values.push((rule.field.clone(), self.generate(rule)?));
                }

                match store.update_identity(table, row.id, &values).await {
                    Ok(_) => {
                        report.rows_anonymized += 1;
                        let replaced: Vec<ReplacedField<'_>> = columns
                            .iter()
                            .zip(&row.values)
                            .map(|(field, original)| ReplacedField {
                                field,
                                original: original.as_deref(),
                            })
                            .collect();
                        self.audit(scope, &table.name, row.id, &replaced);
                    }
                    Err(e) => {
                        report.rows_failed += 1;
                        report.record_warning(RunWarning::RowUpdateFailed {
                            table: table.name.clone(),
                            row_id: row.id,
                            reason: e.to_string(),
                        });
                    }
                }
            }

            if exhausted {
                break;
            }
        }
        Ok(())
    }

    async fn anonymize_attributes(
        &self,
        store: &dyn IdentityStore,
        scope: &Scope,
        table: &AttributeTable,
        report: &mut AnonymizationReport,
    ) -> Result<()> {
        let mut after = KEYSET_START;
        loop {
            self.check_cancelled(scope)?;

            let owners = store
                .attribute_owners(table, after, self.batch_size)
                .await?;
            let Some(&last) = owners.last() else {
                break;
            };
            after = last;
            let exhausted = owners.len() < self.batch_size;

            for owner in owners {
                if self.rules.is_protected(owner) {
                    continue;
                }
                self.anonymize_owner(store, scope, table, owner, report)
                    .await?;
            }

            if exhausted {
                break;
            }
        }
        Ok(())
    }

    async fn anonymize_owner(
        &self,
        store: &dyn IdentityStore,
        scope: &Scope,
        table: &AttributeTable,
        owner: i64,
        report: &mut AnonymizationReport,
    ) -> Result<()> {
        let mut originals: Vec<(&str, String)> = Vec::new();

        for rule in &self.rules.attribute_keys {
            let key = rule.field.as_str();
            let current = match store.attribute_value(table, owner, key).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    self.attribute_failed(table, owner, key, e, report);
                    continue;
                }
            };

            let replacement = self.generate(rule)?;
            match store
                .update_attribute(table, owner, key, &replacement)
                .await
            {
                Ok(_) => {
                    report.meta_values_anonymized += 1;
                    originals.push((key, current));
                }
                Err(e) => self.attribute_failed(table, owner, key, e, report),
            }
        }

        if !originals.is_empty() {
            let replaced: Vec<ReplacedField<'_>> = originals
                .iter()
                .map(|(field, original)| ReplacedField {
                    field,
                    original: Some(original.as_str()),
                })
                .collect();
            self.audit(scope, &table.name, owner, &replaced);
        }
        Ok(())
    }

    fn attribute_failed(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
        error: DbAnonError,
        report: &mut AnonymizationReport,
    ) {
        report.meta_values_failed += 1;
        report.record_warning(RunWarning::RowUpdateFailed {
            table: table.name.clone(),
            row_id: owner,
            reason: format!("{key}: {error}"),
        });
    }

    fn generate(&self, rule: &AnonymizationRule) -> Result<String> {
        if rule.unique {
            self.pool
                .draw(rule.class(), || self.generator.generate(rule.generator))
        } else {
            Ok(self.generator.generate(rule.generator))
        }
    }

    fn audit(&self, scope: &Scope, table: &str, row_id: i64, fields: &[ReplacedField<'_>]) {
        if let Some(logger) = &self.audit_logger {
            if let Err(e) = logger.log_row(&scope.to_string(), table, row_id, fields) {
                tracing::warn!(error = %e, table, row_id, "Failed to write audit entry");
            }
        }
    }

    fn check_cancelled(&self, scope: &Scope) -> Result<()> {
        match &self.shutdown {
            Some(rx) if *rx.borrow() => Err(DbAnonError::Cancelled(format!(
                "interrupted while anonymizing {scope}"
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::traits::DatabaseBackend;
    use crate::adapters::memory::{row, MemoryCluster};
    use crate::anonymization::config::GeneratorKind;
    use crate::domain::ids::{DatabaseName, TablePrefix};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic generator: `<kind>-<n>`
    struct Counter(AtomicUsize);

    impl ValueGenerator for Counter {
        fn generate(&self, kind: GeneratorKind) -> String {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            format!("{kind}-{n}")
        }
    }

    /// Always returns the same value
    struct Constant;

    impl ValueGenerator for Constant {
        fn generate(&self, _kind: GeneratorKind) -> String {
            "same".to_string()
        }
    }

    fn seed(cluster: &MemoryCluster) {
        cluster.add_database("app");
        cluster.add_table(
            "app",
            "wp_users",
            (1..=3)
                .map(|id| {
                    let id = id.to_string();
                    row([
                        ("ID", id.as_str()),
                        ("user_login", "login"),
                        ("user_nicename", "nice"),
                        ("user_email", "user@corp.example"),
                        ("display_name", "Real Name"),
                    ])
                })
                .collect(),
        );
        cluster.add_table(
            "app",
            "wp_usermeta",
            vec![
                row([("user_id", "1"), ("meta_key", "first_name"), ("meta_value", "Admin")]),
                row([("user_id", "2"), ("meta_key", "first_name"), ("meta_value", "Jane")]),
                row([("user_id", "2"), ("meta_key", "last_name"), ("meta_value", "Doe")]),
                row([("user_id", "3"), ("meta_key", "first_name"), ("meta_value", "John")]),
                row([("user_id", "3"), ("meta_key", "wp_capabilities"), ("meta_value", "a:1")]),
            ],
        );
    }

    fn root_scope() -> Scope {
        Scope::root(
            DatabaseName::new("app").unwrap(),
            TablePrefix::new("wp_").unwrap(),
        )
    }

    fn engine(generator: Arc<dyn ValueGenerator>, batch_size: usize) -> AnonymizationEngine {
        let mut config = DbAnonConfig::default();
        config.pipeline.batch_size = batch_size;
        AnonymizationEngine::new(&config, generator).unwrap()
    }

    async fn store(cluster: &MemoryCluster) -> Arc<dyn IdentityStore> {
        cluster
            .connect(&DatabaseName::new("app").unwrap())
            .await
            .unwrap()
    }

    fn value(cluster: &MemoryCluster, table: &str, index: usize, column: &str) -> Option<String> {
        cluster.table("app", table).unwrap()[index][column].clone()
    }

    #[tokio::test]
    async fn test_skips_protected_and_rewrites_others() {
        let cluster = MemoryCluster::new();
        seed(&cluster);
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 2);

        let report = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap();

        assert_eq!(report.rows_seen, 3);
        assert_eq!(report.rows_protected, 1);
        assert_eq!(report.rows_anonymized, 2);
        assert_eq!(report.meta_values_anonymized, 3);
        assert!(report.warnings.is_empty());

        assert_eq!(value(&cluster, "wp_users", 0, "user_login").as_deref(), Some("login"));
        for index in [1, 2] {
            let email = value(&cluster, "wp_users", index, "user_email").unwrap();
            assert!(email.starts_with("safe_email-"));
        }

        let meta = cluster.table("app", "wp_usermeta").unwrap();
        assert_eq!(meta[0]["meta_value"].as_deref(), Some("Admin"));
        assert_ne!(meta[1]["meta_value"].as_deref(), Some("Jane"));
        assert_ne!(meta[2]["meta_value"].as_deref(), Some("Doe"));
        assert_eq!(meta[4]["meta_value"].as_deref(), Some("a:1"));
    }

    #[tokio::test]
    async fn test_unique_logins_never_repeat() {
        let cluster = MemoryCluster::new();
        seed(&cluster);
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 500);

        engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap();

        let logins: Vec<_> = (1..=2)
            .map(|i| value(&cluster, "wp_users", i, "user_login").unwrap())
            .collect();
        assert_ne!(logins[0], logins[1]);
        assert_eq!(engine.unique_pool().len("username"), 4);
    }

    #[tokio::test]
    async fn test_exhausted_uniqueness_is_fatal() {
        let cluster = MemoryCluster::new();
        seed(&cluster);
        let engine = engine(Arc::new(Constant), 500);

        let err = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::UniqueGenerationExhausted { .. }));
    }

    #[tokio::test]
    async fn test_missing_identity_table_is_warning() {
        let cluster = MemoryCluster::new();
        cluster.add_database("app");
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 500);

        let report = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap();
        assert_eq!(report.rows_anonymized, 0);
        assert_eq!(report.tables_missing, 1);
        assert_eq!(cluster.write_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_root_scope_has_no_identities() {
        let cluster = MemoryCluster::new();
        cluster.add_database("app");
        cluster.add_table("app", "wp_users", Vec::new());
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 500);

        let err = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap_err();
        assert!(matches!(err, DbAnonError::NoIdentitiesFound { .. }));
    }

    #[tokio::test]
    async fn test_empty_tenant_scope_is_fine() {
        let cluster = MemoryCluster::new();
        cluster.add_database("app");
        cluster.add_table("app", "wp_2_users", Vec::new());
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 500);
        let scope = Scope::tenant(
            DatabaseName::new("app").unwrap(),
            TablePrefix::new("wp_2_").unwrap(),
            2,
        );

        let report = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &scope)
            .await
            .unwrap();
        assert_eq!(report.rows_seen, 0);
        assert_eq!(report.tables_missing, 1);
    }

    #[tokio::test]
    async fn test_failed_row_update_continues() {
        let cluster = MemoryCluster::new();
        seed(&cluster);
        cluster.fail_row_update("wp_users", 2);
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 500);

        let report = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap();

        assert_eq!(report.rows_failed, 1);
        assert_eq!(report.rows_anonymized, 1);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, RunWarning::RowUpdateFailed { row_id: 2, .. })));
        assert_eq!(value(&cluster, "wp_users", 1, "user_login").as_deref(), Some("login"));
    }

    #[tokio::test]
    async fn test_cancellation_between_chunks() {
        let cluster = MemoryCluster::new();
        seed(&cluster);
        let (tx, rx) = watch::channel(false);
        let tx = Arc::new(tx);
        let trigger = tx.clone();
        cluster.after_identity_batch(move || {
            let _ = trigger.send(true);
        });
        let engine = engine(Arc::new(Counter(AtomicUsize::new(0))), 2).with_shutdown(rx);

        let err = engine
            .anonymize_scope(store(&cluster).await.as_ref(), &root_scope())
            .await
            .unwrap_err();

        assert!(matches!(err, DbAnonError::Cancelled(_)));
        // first chunk (IDs 1 and 2) completed, ID 3 untouched
        assert_ne!(value(&cluster, "wp_users", 1, "user_login").as_deref(), Some("login"));
        assert_eq!(value(&cluster, "wp_users", 2, "user_login").as_deref(), Some("login"));
    }
}
