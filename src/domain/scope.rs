//! Tenant scopes

use super::ids::{DatabaseName, TablePrefix};
use serde::Serialize;
use std::fmt;

/// One tenant's table namespace inside a database
///
/// The root scope of a single-tenant database has no tenant id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Scope {
    pub database: DatabaseName,
    pub prefix: TablePrefix,
    pub tenant_id: Option<i64>,
}

impl Scope {
    pub fn root(database: DatabaseName, prefix: TablePrefix) -> Self {
        Self {
            database,
            prefix,
            tenant_id: None,
        }
    }

    pub fn tenant(database: DatabaseName, prefix: TablePrefix, tenant_id: i64) -> Self {
        Self {
            database,
            prefix,
            tenant_id: Some(tenant_id),
        }
    }

    /// Physical name of a logical table in this scope
    pub fn table(&self, logical: &str) -> String {
        self.prefix.table(logical)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tenant_id {
            Some(id) => write!(f, "{}/{} (tenant {id})", self.database, self.prefix),
            None => write!(f, "{}/{}", self.database, self.prefix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_tables_and_display() {
        let db = DatabaseName::new("app").unwrap();
        let base = TablePrefix::new("wp_").unwrap();
        let root = Scope::root(db.clone(), base.clone());
        assert_eq!(root.table("users"), "wp_users");
        assert_eq!(root.to_string(), "app/wp_");

        let tenant = Scope::tenant(db, base.for_tenant(2).unwrap(), 2);
        assert_eq!(tenant.table("usermeta"), "wp_2_usermeta");
        assert_eq!(tenant.to_string(), "app/wp_2_ (tenant 2)");
    }
}
