//! Tenant loaders.
//!
//! A [`TenantLoader`] yields the fixed, ordered set of tenants a process
//! serves. The set is decided at construction and never changes afterwards.

use std::fmt::Debug;

use super::id::TenantId;

/// Source of the tenants served by this process.
pub trait TenantLoader: Send + Sync + Debug {
    /// Returns the tenants in a stable order.
    fn tenants(&self) -> Vec<TenantId>;
}

/// A loader over a list fixed at construction.
///
/// # Examples
///
/// ```
/// use strata_persistence::tenant::{FixedTenantLoader, TenantId, TenantLoader};
///
/// let loader = FixedTenantLoader::parse("acme|Acme Corp, beta");
/// assert_eq!(loader.tenants(), vec![TenantId::new("acme"), TenantId::new("beta")]);
///
/// let single = FixedTenantLoader::single_tenant();
/// assert_eq!(single.tenants(), vec![TenantId::default_tenant()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedTenantLoader {
    tenants: Vec<TenantId>,
}

impl FixedTenantLoader {
    /// Creates a loader over the given tenants, dropping duplicates while
    /// keeping first-seen order.
    pub fn new<I, T>(tenants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantId>,
    {
        let mut unique: Vec<TenantId> = Vec::new();
        for tenant in tenants {
            let tenant = tenant.into();
            if !unique.contains(&tenant) {
                unique.push(tenant);
            }
        }
        Self { tenants: unique }
    }

    /// The loader for a single-tenant deployment: only the default tenant.
    pub fn single_tenant() -> Self {
        Self {
            tenants: vec![TenantId::default_tenant()],
        }
    }

    /// Parses a comma-separated tenant list.
    ///
    /// Each entry may carry a `|`-separated description which is ignored
    /// (`"acme|Acme Corp"` yields `acme`). Blank entries are skipped.
    pub fn parse(list: &str) -> Self {
        Self::new(
            list.split(',')
                .filter_map(|entry| entry.split('|').next())
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(TenantId::new),
        )
    }

    /// Returns `true` if no tenant was configured.
    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

impl TenantLoader for FixedTenantLoader {
    fn tenants(&self) -> Vec<TenantId> {
        self.tenants.clone()
    }
}
