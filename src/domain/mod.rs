//! Domain types for dbanon.
//!
//! - **Identifiers** ([`DatabaseName`], [`TablePrefix`]) validated before they reach SQL text
//! - **Scopes** ([`Scope`]) naming one tenant's tables
//! - **Errors** ([`DbAnonError`] for fatal conditions, [`RunWarning`] for recorded ones)
//! - **Result alias** ([`Result`])
//!
//! ```rust
//! use dbanon::domain::{DatabaseName, TablePrefix, Scope};
//!
//! # fn example() -> Result<(), String> {
//! let scope = Scope::root(DatabaseName::new("wordpress")?, TablePrefix::new("wp_")?);
//! assert_eq!(scope.table("users"), "wp_users");
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod errors;
pub mod ids;
pub mod result;
pub mod scope;

pub use errors::{DbAnonError, RunWarning};
pub use ids::{DatabaseName, TablePrefix};
pub use result::Result;
pub use scope::Scope;
