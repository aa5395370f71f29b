//! PostgreSQL adapter implementing the row-level store
//!
//! Names are quoted with [`quote_ident`]; ids travel as `bigint` parameters so
//! that both `integer` and `bigint` key columns work.

use crate::adapters::database::traits::{AttributeTable, IdentityRow, IdentityStore, IdentityTable};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::ids::quote_ident;
use crate::domain::{DbAnonError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// PostgreSQL implementation of [`IdentityStore`]
pub struct PostgreSQLAdapter {
    client: Arc<PostgreSQLClient>,
}

impl PostgreSQLAdapter {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn limit_param(limit: usize) -> Result<i64> {
    i64::try_from(limit)
        .map_err(|_| DbAnonError::Configuration(format!("Batch size {limit} is out of range")))
}

fn row_error(e: tokio_postgres::Error) -> DbAnonError {
    DbAnonError::Database(format!("Failed to decode row: {e}"))
}

pub(crate) fn identity_select_sql(table: &IdentityTable, columns: &[String]) -> String {
    let key = quote_ident(&table.key);
    let mut projection = vec![format!("{key}::bigint")];
    projection.extend(columns.iter().map(|c| format!("{}::text", quote_ident(c))));
    format!(
        "SELECT {} FROM {} WHERE {key} > $1::bigint ORDER BY {key} LIMIT $2::bigint",
        projection.join(", "),
        quote_ident(&table.name),
    )
}

pub(crate) fn identity_update_sql(table: &IdentityTable, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}", quote_ident(c), i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ${}::bigint",
        quote_ident(&table.name),
        assignments.join(", "),
        quote_ident(&table.key),
        columns.len() + 1,
    )
}

#[async_trait]
impl IdentityStore for PostgreSQLAdapter {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_opt(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
                &[&table],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let rows = self.client.query(&sql, &[]).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0).map_err(row_error)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn tenant_ids(&self, registry_table: &str, id_column: &str) -> Result<Vec<i64>> {
        let column = quote_ident(id_column);
        let sql = format!(
            "SELECT {column}::bigint FROM {} ORDER BY {column}",
            quote_ident(registry_table)
        );
        self.client
            .query(&sql, &[])
            .await?
            .iter()
            .map(|row| row.try_get::<_, i64>(0).map_err(row_error))
            .collect()
    }

    async fn identity_batch(
        &self,
        table: &IdentityTable,
        columns: &[String],
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<IdentityRow>> {
        let sql = identity_select_sql(table, columns);
        let limit = limit_param(limit)?;
        let rows = self.client.query(&sql, &[&after_id, &limit]).await?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get(0).map_err(row_error)?;
                let values = (1..=columns.len())
                    .map(|i| row.try_get::<_, Option<String>>(i).map_err(row_error))
                    .collect::<Result<Vec<_>>>()?;
                Ok(IdentityRow { id, values })
            })
            .collect()
    }

    async fn update_identity(
        &self,
        table: &IdentityTable,
        id: i64,
        values: &[(String, String)],
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
        let sql = identity_update_sql(table, &columns);

        let mut params: Vec<&(dyn ToSql + Sync)> = values
            .iter()
            .map(|(_, v)| v as &(dyn ToSql + Sync))
            .collect();
        params.push(&id);

        self.client.execute(&sql, &params).await
    }

    async fn attribute_owners(
        &self,
        table: &AttributeTable,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<i64>> {
        let owner = quote_ident(&table.owner_column);
        let sql = format!(
            "SELECT DISTINCT {owner}::bigint FROM {} WHERE {owner} > $1::bigint \
             ORDER BY 1 LIMIT $2::bigint",
            quote_ident(&table.name)
        );
        let limit = limit_param(limit)?;
        self.client
            .query(&sql, &[&after_id, &limit])
            .await?
            .iter()
            .map(|row| row.try_get::<_, i64>(0).map_err(row_error))
            .collect()
    }

    async fn attribute_value(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
    ) -> Result<Option<String>> {
        let sql = format!(
            "SELECT {}::text FROM {} WHERE {} = $1::bigint AND {} = $2 LIMIT 1",
            quote_ident(&table.value_column),
            quote_ident(&table.name),
            quote_ident(&table.owner_column),
            quote_ident(&table.key_column),
        );
        match self.client.query_opt(&sql, &[&owner, &key]).await? {
            Some(row) => {
                let value: Option<String> = row.try_get(0).map_err(row_error)?;
                Ok(Some(value.unwrap_or_default()))
            }
            None => Ok(None),
        }
    }

    async fn update_attribute(
        &self,
        table: &AttributeTable,
        owner: i64,
        key: &str,
        value: &str,
    ) -> Result<u64> {
        let sql = format!(
            "UPDATE {} SET {} = $1 WHERE {} = $2::bigint AND {} = $3",
            quote_ident(&table.name),
            quote_ident(&table.value_column),
            quote_ident(&table.owner_column),
            quote_ident(&table.key_column),
        );
        self.client.execute(&sql, &[&value, &owner, &key]).await
    }
}
