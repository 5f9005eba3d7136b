//! Core storage abstractions.
//!
//! - [`DataSource`] - Tenant-bound storage handle with row-level operations
//! - [`MigrationSource`] - Ordered, versioned migration scripts
//!
//! Every tenant owns one data source; nothing in this module ever reaches
//! across tenants.

mod datasource;
mod migration;

pub use datasource::{
    BoxFuture, DataSource, TransactionWork, run_in_transaction, transaction_work,
};
pub use migration::{
    DEFAULT_MIGRATIONS_TABLE, DirMigrationSource, MigrationScript, MigrationSource,
    SHARED_LOCATION, SINGLE_LOCATION, StaticMigrationSource, TENANT_LOCATION,
};
