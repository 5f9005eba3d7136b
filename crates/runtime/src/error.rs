//! Bootstrap errors.
//!
//! Any failure while starting an application is fatal: it is returned to the
//! caller as a single [`BootstrapError`] and nothing is retried.

use strata_persistence::error::StorageError;
use strata_persistence::tenant::TenantId;
use thiserror::Error;

/// Why an application failed to start.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// The feature graph contains a cycle.
    #[error("dependency cycle: {chain}")]
    DependencyCycle {
        /// The feature names along the cycle, e.g. `a -> b -> a`.
        chain: String,
    },

    /// A feature's migrations failed on one tenant.
    #[error("migration of feature '{feature}' failed for tenant '{tenant}': {source}")]
    Migration {
        /// The feature whose scripts failed.
        feature: String,
        /// The tenant being migrated.
        tenant: TenantId,
        /// The underlying storage error.
        #[source]
        source: StorageError,
    },

    /// A feature's configuration callback failed.
    #[error("configuration of feature '{feature}' failed: {source}")]
    Configure {
        /// The feature being configured.
        feature: String,
        /// The callback's error.
        #[source]
        source: anyhow::Error,
    },

    /// The configuration is invalid.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// A data source could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for bootstrap operations.
pub type BootstrapResult<T> = Result<T, BootstrapError>;
