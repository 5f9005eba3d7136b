//! Tenant management.
//!
//! Every tenant owns exactly one [`DataSource`](crate::core::DataSource),
//! created at bootstrap and closed at shutdown. This module provides the types
//! that tie tenants to their data sources:
//!
//! - [`TenantId`] - Opaque tenant identifier, with one reserved default tenant
//! - [`TenantLoader`] / [`FixedTenantLoader`] - The tenants a process serves
//! - [`TenantDataSources`] - The total, stable tenant → data source mapping
//! - [`TenantContext`] - Per-call context carrying the active data source
//!
//! # Examples
//!
//! ```
//! use strata_persistence::tenant::{FixedTenantLoader, TenantId, TenantLoader, DEFAULT_TENANT};
//!
//! let loader = FixedTenantLoader::parse("acme,beta");
//! assert_eq!(loader.tenants().len(), 2);
//! assert_eq!(TenantId::default_tenant().as_str(), DEFAULT_TENANT);
//! ```

mod context;
mod id;
mod loader;
mod sources;

pub use context::TenantContext;
pub use id::{DEFAULT_TENANT, TenantId};
pub use loader::{FixedTenantLoader, TenantLoader};
pub use sources::TenantDataSources;
