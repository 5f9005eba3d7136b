//! Strata persistence layer
//!
//! Multi-tenant data access: every tenant owns one [`DataSource`] and
//! application code reaches it only through typed repositories.
//!
//! # Features
//!
//! - **Tenant isolation**: one data source (database and pool) per tenant
//! - **Declarative queries**: [`Query`] descriptors with `?` placeholders and
//!   list expansion for `in (?)`
//! - **Typed repositories**: one generic [`Repository`] with context-bound
//!   and tenant-bound flavors, plus pre-create/pre-update hooks
//! - **Migrations**: ordered, idempotent scripts tracked per tenant
//! - **Transactions**: all-or-nothing units of work on a tenant
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`tenant`] - Tenant ids, loaders, per-call context, the tenant → data source map
//! - [`types`] - Entities, queries, paging
//! - [`error`] - Error types for all operations
//! - [`core`] - The data source and migration contracts
//! - [`backends`] - Backend implementations
//! - [`repository`] - Typed repositories, list and search
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde::{Deserialize, Serialize};
//! use strata_persistence::args;
//! use strata_persistence::backends::sqlite::SqliteDataSource;
//! use strata_persistence::core::DataSource;
//! use strata_persistence::repository::ContextRepo;
//! use strata_persistence::tenant::{TenantContext, TenantId};
//! use strata_persistence::types::Entity;
//!
//! #[derive(Debug, Clone, Default, Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Entity for User {
//!     const MODEL: &'static str = "users";
//!     const ID_PREFIX: &'static str = "usr";
//!
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//!
//!     fn set_id(&mut self, id: String) {
//!         self.id = id;
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ds: Arc<dyn DataSource> = Arc::new(SqliteDataSource::in_memory(TenantId::new("acme"))?);
//! ds.raw("CREATE TABLE users (id TEXT PRIMARY KEY, name TEXT)", args![]).await?;
//!
//! let ctx = TenantContext::new(ds);
//! let users: ContextRepo<User> = ContextRepo::new();
//! let ann = users.create(&ctx, User { name: "Ann".into(), ..User::default() }).await?;
//! assert!(ann.id.starts_with("usr_"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod repository;
pub mod tenant;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ErrorKind, StorageError, StorageResult};
pub use tenant::{TenantContext, TenantDataSources, TenantId, TenantLoader};
pub use types::{Entity, EntityList, FilterInput, Paging, Query, Row, SqlValue};

// Re-export core traits
pub use core::{DataSource, MigrationSource};

pub use repository::{ContextRepo, Repository, TenantRepo};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
