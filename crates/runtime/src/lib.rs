//! # strata-runtime
//!
//! Application bootstrap for multi-tenant Strata services.
//!
//! An [`App`] opens one data source per tenant, applies every feature's
//! migrations to each tenant in dependency order, runs each feature's
//! configuration exactly once and closes everything at shutdown.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use strata_persistence::core::DirMigrationSource;
//! use strata_runtime::{App, Feature, RuntimeConfig, init_logging};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RuntimeConfig::from_env()?;
//! init_logging(&config.log_level);
//!
//! let accounts = Arc::new(
//!     Feature::new("accounts")
//!         .with_migrations(Arc::new(DirMigrationSource::new("accounts", "migrations/accounts")))
//!         .on_configure(|app| {
//!             tracing::info!(tenants = app.tenants().len(), "accounts ready");
//!             Ok(())
//!         }),
//! );
//!
//! let app = App::builder("billing").with_config(config).build()?;
//! app.init(&[accounts]).await?;
//! // ... serve traffic ...
//! app.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Migrations
//!
//! | Mode | Tenant | Location |
//! |------|--------|----------|
//! | single-tenant | default | `db` |
//! | multi-tenant | default | `db/shared` |
//! | multi-tenant | any other | `db/tenant` |
//!
//! ## Configuration
//!
//! See [`RuntimeConfig`] for the environment variables.

#![warn(missing_docs)]

pub mod app;
pub mod config;
pub mod error;
pub mod feature;
pub mod logging;
pub mod registry;

pub use app::{App, AppBuilder};
pub use config::RuntimeConfig;
pub use error::{BootstrapError, BootstrapResult};
pub use feature::{Feature, resolve_order};
pub use logging::init_logging;
pub use registry::ServiceRegistry;
