//! The process-wide tenant → data source mapping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::DataSource;
use crate::error::{StorageResult, TenantError};

use super::id::TenantId;

/// One data source per tenant, fixed for the lifetime of the process.
///
/// The mapping is total over the registered tenants and keeps registration
/// order, which is the order bootstrap migrates them in.
#[derive(Debug, Clone, Default)]
pub struct TenantDataSources {
    order: Vec<TenantId>,
    sources: HashMap<TenantId, Arc<dyn DataSource>>,
}

impl TenantDataSources {
    /// Creates an empty mapping.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the data source for its tenant.
    ///
    /// A tenant can only be registered once.
    pub fn insert(&mut self, data_source: Arc<dyn DataSource>) -> StorageResult<()> {
        let tenant = data_source.tenant().clone();
        if self.sources.contains_key(&tenant) {
            return Err(TenantError::DuplicateDataSource { tenant_id: tenant }.into());
        }
        self.order.push(tenant.clone());
        self.sources.insert(tenant, data_source);
        Ok(())
    }

    /// Returns the data source for `tenant`.
    pub fn get(&self, tenant: &TenantId) -> StorageResult<Arc<dyn DataSource>> {
        self.sources.get(tenant).cloned().ok_or_else(|| {
            TenantError::InvalidTenant {
                tenant_id: tenant.clone(),
            }
            .into()
        })
    }

    /// Returns `true` if the tenant has a data source.
    pub fn contains(&self, tenant: &TenantId) -> bool {
        self.sources.contains_key(tenant)
    }

    /// Returns the tenants in registration order.
    pub fn tenants(&self) -> &[TenantId] {
        &self.order
    }

    /// Iterates `(tenant, data source)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&TenantId, &Arc<dyn DataSource>)> {
        self.order
            .iter()
            .filter_map(|tenant| self.sources.get(tenant).map(|ds| (tenant, ds)))
    }

    /// Number of registered tenants.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Closes every data source. Safe to call more than once.
    pub async fn close_all(&self) {
        for (tenant, data_source) in self.iter() {
            data_source.close().await;
            tracing::debug!(tenant = %tenant, "data source closed");
        }
    }
}
