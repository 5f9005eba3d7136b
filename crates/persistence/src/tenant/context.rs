//! Per-call execution context.
//!
//! A [`TenantContext`] carries the tenant a call runs on behalf of together
//! with that tenant's [`DataSource`]. Request handlers build one per request;
//! context-bound repositories resolve their data source from it.

use std::sync::Arc;

use super::id::TenantId;
use crate::core::DataSource;
use crate::error::StorageResult;

use super::sources::TenantDataSources;

/// The execution context of one call.
///
/// Cloning is cheap: the data source is shared, never copied.
#[derive(Debug, Clone)]
pub struct TenantContext {
    /// The tenant identifier.
    tenant_id: TenantId,
    /// The tenant's data source (or a transaction handle on it).
    data_source: Arc<dyn DataSource>,
    /// Optional correlation ID for request tracing.
    correlation_id: Option<String>,
}

impl TenantContext {
    /// Creates a context over the given data source.
    ///
    /// The tenant is taken from the data source itself so the two can never
    /// disagree.
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self {
            tenant_id: data_source.tenant().clone(),
            data_source,
            correlation_id: None,
        }
    }

    /// Creates a context for `tenant` from the process-wide data sources.
    ///
    /// Fails with [`TenantError::InvalidTenant`](crate::error::TenantError::InvalidTenant)
    /// if the tenant is unknown.
    pub fn for_tenant(sources: &TenantDataSources, tenant: &TenantId) -> StorageResult<Self> {
        Ok(Self::new(sources.get(tenant)?))
    }

    /// Creates a context with the specified correlation ID for tracing.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Returns a copy of this context running on another handle of the same
    /// tenant, typically a transaction handle.
    pub fn with_data_source(&self, data_source: Arc<dyn DataSource>) -> Self {
        Self {
            tenant_id: data_source.tenant().clone(),
            data_source,
            correlation_id: self.correlation_id.clone(),
        }
    }

    /// Returns the tenant ID.
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the active data source.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }

    /// Returns the correlation ID, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }
}
