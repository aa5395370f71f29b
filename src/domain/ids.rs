//! Domain identifier types with validation
//!
//! Table and database names cannot be bound as statement parameters, so every
//! name that ends up inside SQL text goes through one of these newtypes first.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum identifier length accepted by PostgreSQL
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Returns true if `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Returns true if `name` can be used as a database name
///
/// Database names are always quoted in SQL and passed to the client tools as
/// a single argument, so hyphens are allowed anywhere but the first position
/// (where `pg_dump` would read the name as an option).
pub fn is_valid_database_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    name.len() <= MAX_IDENTIFIER_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Quotes an identifier for inclusion in SQL text
///
/// # Examples
///
/// ```
/// use dbanon::domain::ids::quote_ident;
///
/// assert_eq!(quote_ident("wp_users"), "\"wp_users\"");
/// assert_eq!(quote_ident("ID"), "\"ID\"");
/// ```
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Database name newtype wrapper
///
/// # Examples
///
/// ```
/// use dbanon::domain::ids::DatabaseName;
/// use std::str::FromStr;
///
/// let db = DatabaseName::from_str("wordpress").unwrap();
/// assert_eq!(db.as_str(), "wordpress");
/// assert!(DatabaseName::from_str("bad name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseName(String);

impl DatabaseName {
    /// Creates a new DatabaseName from a string
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err("Database name cannot be empty".to_string());
        }
        if !is_valid_database_name(&name) {
            return Err(format!(
                "Invalid database name '{name}'. Use letters, digits, underscores and hyphens, not starting with a hyphen (max {MAX_IDENTIFIER_LEN} characters)"
            ));
        }
        Ok(Self(name))
    }

    /// Returns the database name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives the time-suffixed working copy name: `<name>_temp_<YYYY_MM_DD_HH_mm_ss>`
    pub fn working_copy_name<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> Result<Self, String>
    where
        Tz::Offset: fmt::Display,
    {
        Self::new(format!("{}_temp_{}", self.0, at.format("%Y_%m_%d_%H_%M_%S")))
    }

    /// File name of the plain dump of this database
    pub fn dump_file_name(&self) -> String {
        format!("{}.sql", self.0)
    }

    /// File name of the anonymized dump of this database
    pub fn anonymized_dump_file_name(&self) -> String {
        format!("{}_anonymized.sql", self.0)
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatabaseName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DatabaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Table prefix newtype wrapper
///
/// A prefix may be empty. Otherwise it follows identifier rules, so that
/// `<prefix><logical table>` is always a valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TablePrefix(String);

impl TablePrefix {
    /// Creates a new TablePrefix from a string
    pub fn new(prefix: impl Into<String>) -> Result<Self, String> {
        let prefix = prefix.into();
        if !prefix.is_empty() && !is_valid_identifier(&prefix) {
            return Err(format!(
                "Invalid table prefix '{prefix}'. Use letters, digits and underscores"
            ));
        }
        Ok(Self(prefix))
    }

    /// Prefix used by a secondary tenant: `<base><tenant_id>_`
    pub fn for_tenant(&self, tenant_id: i64) -> Result<Self, String> {
        Self::new(format!("{}{}_", self.0, tenant_id))
    }

    /// Physical table name for a logical table in this namespace
    pub fn table(&self, logical: &str) -> String {
        format!("{}{}", self.0, logical)
    }

    /// Returns the prefix as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TablePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TablePrefix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use test_case::test_case;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("wp_users"));
        assert!(is_valid_identifier("_hidden"));
        assert!(is_valid_identifier("ID"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1users"));
        assert!(!is_valid_identifier("users; DROP TABLE x"));
        assert!(!is_valid_identifier(&"a".repeat(64)));
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_database_name_rejects_injection() {
        assert!(DatabaseName::new("app").is_ok());
        assert!(DatabaseName::new("").is_err());
        assert!(DatabaseName::new("app'; --").is_err());
    }

    #[test_case("my-app" ; "hyphenated")]
    #[test_case("shop_2024" ; "underscored")]
    #[test_case("2024archive" ; "leading digit")]
    fn test_database_name_accepts(name: &str) {
        assert_eq!(DatabaseName::new(name).unwrap().as_str(), name);
    }

    #[test_case("-app" ; "leading hyphen")]
    #[test_case("my app" ; "space")]
    #[test_case("shop; DROP" ; "semicolon")]
    #[test_case("shop\"x" ; "quote")]
    fn test_database_name_rejects(name: &str) {
        assert!(DatabaseName::new(name).is_err());
    }

    #[test]
    fn test_hyphenated_working_copy_name() {
        let db = DatabaseName::new("my-app").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            db.working_copy_name(&at).unwrap().as_str(),
            "my-app_temp_2024_03_09_14_05_07"
        );
    }

    #[test]
    fn test_working_copy_name_format() {
        let db = DatabaseName::new("wordpress").unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let temp = db.working_copy_name(&at).unwrap();
        assert_eq!(temp.as_str(), "wordpress_temp_2024_03_09_14_05_07");
    }

    #[test]
    fn test_working_copy_name_too_long() {
        let db = DatabaseName::new("a".repeat(50)).unwrap();
        assert!(db.working_copy_name(&Utc::now()).is_err());
    }

    #[test]
    fn test_dump_file_names() {
        let db = DatabaseName::new("shop").unwrap();
        assert_eq!(db.dump_file_name(), "shop.sql");
        assert_eq!(db.anonymized_dump_file_name(), "shop_anonymized.sql");
    }

    #[test]
    fn test_table_prefix() {
        let prefix = TablePrefix::new("wp_").unwrap();
        assert_eq!(prefix.table("users"), "wp_users");
        assert_eq!(prefix.for_tenant(3).unwrap().table("usermeta"), "wp_3_usermeta");
        assert!(TablePrefix::new("").is_ok());
        assert!(TablePrefix::new("wp-").is_err());
    }
}
