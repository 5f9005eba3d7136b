//! How a repository finds its data source.

use std::fmt;
use std::sync::Arc;

use crate::core::DataSource;
use crate::error::StorageResult;
use crate::tenant::{TenantContext, TenantDataSources, TenantId};

/// Resolves the data source a repository call runs against.
///
/// The scope is what each call supplies: a [`TenantContext`] for
/// [`ContextBinding`], nothing for [`TenantBinding`].
pub trait Binding: Send + Sync {
    /// Per-call input needed to resolve the data source.
    type Scope<'s>: Copy + Send + Sync
    where
        Self: 's;

    /// Returns the active data source for this call.
    fn resolve<'s>(&'s self, scope: Self::Scope<'s>) -> &'s Arc<dyn DataSource>;
}

/// Resolves the data source from the caller's [`TenantContext`].
///
/// Used by request handlers: the same repository value serves every tenant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextBinding;

impl Binding for ContextBinding {
    type Scope<'s> = &'s TenantContext;

    fn resolve<'s>(&'s self, ctx: &'s TenantContext) -> &'s Arc<dyn DataSource> {
        ctx.data_source()
    }
}

/// Bound once to a fixed data source.
///
/// Used by background work that has no request context.
#[derive(Clone)]
pub struct TenantBinding {
    data_source: Arc<dyn DataSource>,
}

impl TenantBinding {
    /// Binds to `data_source`.
    pub fn new(data_source: Arc<dyn DataSource>) -> Self {
        Self { data_source }
    }

    /// Binds to the data source of `tenant`.
    pub fn for_tenant(sources: &TenantDataSources, tenant: &TenantId) -> StorageResult<Self> {
        Ok(Self::new(sources.get(tenant)?))
    }

    /// The bound data source.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.data_source
    }
}

impl fmt::Debug for TenantBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantBinding")
            .field("tenant", self.data_source.tenant())
            .finish()
    }
}

impl Binding for TenantBinding {
    type Scope<'s> = ();

    fn resolve<'s>(&'s self, _scope: ()) -> &'s Arc<dyn DataSource> {
        &self.data_source
    }
}
