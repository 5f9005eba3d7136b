//! SQLite data source.
//!
//! Each tenant gets its own SQLite database: a file resolved from a path
//! template (`data/{tenant}.db`) or a private in-memory database.
//!
//! # Features
//!
//! - r2d2 connection pooling with busy timeout, WAL and foreign keys
//! - Batch writes applied atomically through savepoints
//! - Transactions with `BEGIN IMMEDIATE`
//! - Versioned migrations recorded in a tracking table
//! - Boolean and JSON columns mapped back from their declared types
//!
//! # Example
//!
//! ```no_run
//! use strata_persistence::backends::sqlite::{SqliteConfig, SqliteDataSource};
//! use strata_persistence::tenant::TenantId;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SqliteConfig::new("./data/{tenant}.db");
//! let acme = SqliteDataSource::open(TenantId::new("acme"), &config)?;
//! assert_eq!(acme.path(), "./data/acme.db");
//! # Ok(())
//! # }
//! ```

mod backend;
mod schema;
mod sql;
mod transaction;

pub use backend::{MEMORY_PATH, SqliteConfig, SqliteDataSource, TENANT_PLACEHOLDER};
