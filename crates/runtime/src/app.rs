//! The application container.
//!
//! An [`App`] owns one data source per tenant, the service registry and the
//! set of configured features. It is built once, initialized with the
//! features it runs, and shut down once.
//!
//! # Bootstrap
//!
//! [`App::init`] orders the requested features so that dependencies come
//! first, then for each feature not yet configured:
//!
//! 1. applies its migrations to every tenant, the default tenant first
//!    (`db/shared` for the default tenant and `db/tenant` for the others in
//!    multi-tenant mode, `db` in single-tenant mode);
//! 2. runs its configuration callback;
//! 3. marks it configured, so later calls skip it.
//!
//! The first failure aborts the bootstrap.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use strata_persistence::backends::sqlite::SqliteDataSource;
use strata_persistence::core::{DataSource, SHARED_LOCATION, SINGLE_LOCATION, TENANT_LOCATION};
use strata_persistence::error::StorageResult;
use strata_persistence::tenant::{TenantContext, TenantDataSources, TenantId, TenantLoader};

use crate::config::RuntimeConfig;
use crate::error::{BootstrapError, BootstrapResult};
use crate::feature::{Feature, resolve_order};
use crate::registry::ServiceRegistry;

type ShutdownListener = Box<dyn FnOnce() + Send>;

/// A running Strata application.
pub struct App {
    name: String,
    config: RuntimeConfig,
    data_sources: TenantDataSources,
    registry: ServiceRegistry,
    configured: Mutex<HashSet<String>>,
    shutdown_listeners: Mutex<Vec<ShutdownListener>>,
    closed: AtomicBool,
}

/// Builder for [`App`].
///
/// # Examples
///
/// ```
/// use strata_runtime::{App, RuntimeConfig};
///
/// let app = App::builder("billing")
///     .with_config(RuntimeConfig::for_testing())
///     .build()
///     .unwrap();
/// assert_eq!(app.tenants().len(), 1);
/// ```
pub struct AppBuilder {
    name: String,
    config: RuntimeConfig,
    loader: Option<Arc<dyn TenantLoader>>,
}

impl AppBuilder {
    /// Uses `config` instead of the defaults.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Takes the tenants from `loader` instead of the configured list.
    ///
    /// Ignored in single-tenant mode.
    pub fn with_tenant_loader(mut self, loader: Arc<dyn TenantLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Validates the configuration and opens one data source per tenant.
    pub fn build(self) -> BootstrapResult<App> {
        let loader: Arc<dyn TenantLoader> = match self.loader {
            Some(loader) => loader,
            None => Arc::new(self.config.tenant_loader()),
        };
        self.config
            .validate_with(loader.as_ref())
            .map_err(BootstrapError::InvalidConfig)?;

        let sqlite = self.config.sqlite_config();
        let mut data_sources = TenantDataSources::new();
        for tenant in served_tenants(&self.config, loader.as_ref()) {
            let data_source = SqliteDataSource::open(tenant.clone(), &sqlite)?;
            tracing::info!(
                app = %self.name,
                tenant = %tenant,
                path = %data_source.path(),
                "data source opened"
            );
            data_sources.insert(Arc::new(data_source))?;
        }

        Ok(App {
            name: self.name,
            config: self.config,
            data_sources,
            registry: ServiceRegistry::new(),
            configured: Mutex::new(HashSet::new()),
            shutdown_listeners: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }
}

/// The default tenant followed by the loader's tenants in multi-tenant mode,
/// the default tenant alone otherwise.
fn served_tenants(config: &RuntimeConfig, loader: &dyn TenantLoader) -> Vec<TenantId> {
    let mut tenants = vec![TenantId::default_tenant()];
    if config.multi_tenant {
        for tenant in loader.tenants() {
            if !tenants.contains(&tenant) {
                tenants.push(tenant);
            }
        }
    }
    tenants
}

impl App {
    /// Starts building an application called `name`.
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder {
            name: name.into(),
            config: RuntimeConfig::default(),
            loader: None,
        }
    }

    /// Applies the migrations of `features` and their dependencies, then
    /// configures them, each at most once over the life of the application.
    pub async fn init(&self, features: &[Arc<Feature>]) -> BootstrapResult<()> {
        let configured = self.configured.lock().clone();
        let order = resolve_order(features, &configured)?;

        for feature in order {
            self.migrate(&feature).await?;

            feature
                .configure(self)
                .map_err(|source| BootstrapError::Configure {
                    feature: feature.name().to_string(),
                    source,
                })?;

            self.configured.lock().insert(feature.name().to_string());
            tracing::info!(app = %self.name, feature = %feature.name(), "feature configured");
        }

        Ok(())
    }

    async fn migrate(&self, feature: &Feature) -> BootstrapResult<()> {
        let Some(source) = feature.migrations() else {
            return Ok(());
        };

        for (tenant, data_source) in self.data_sources.iter() {
            let location = self.migration_location(tenant);
            let applied = data_source
                .migrate(source.as_ref(), location, &self.config.migrations_table)
                .await
                .map_err(|source| BootstrapError::Migration {
                    feature: feature.name().to_string(),
                    tenant: tenant.clone(),
                    source,
                })?;
            tracing::info!(
                feature = %feature.name(),
                tenant = %tenant,
                location,
                applied,
                "migrations applied"
            );
        }
        Ok(())
    }

    fn migration_location(&self, tenant: &TenantId) -> &'static str {
        match (self.config.multi_tenant, tenant.is_default()) {
            (false, _) => SINGLE_LOCATION,
            (true, true) => SHARED_LOCATION,
            (true, false) => TENANT_LOCATION,
        }
    }

    /// The application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration the application was built with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Returns `true` in multi-tenant mode.
    pub fn is_multi_tenant(&self) -> bool {
        self.config.multi_tenant
    }

    /// The served tenants, default tenant first.
    pub fn tenants(&self) -> &[TenantId] {
        self.data_sources.tenants()
    }

    /// Every tenant's data source.
    pub fn data_sources(&self) -> &TenantDataSources {
        &self.data_sources
    }

    /// The data source of `tenant`.
    pub fn data_source(&self, tenant: &TenantId) -> StorageResult<Arc<dyn DataSource>> {
        self.data_sources.get(tenant)
    }

    /// A fresh call context for `tenant`.
    pub fn context(&self, tenant: &TenantId) -> StorageResult<TenantContext> {
        TenantContext::for_tenant(&self.data_sources, tenant)
    }

    /// A fresh call context for the default tenant.
    pub fn default_context(&self) -> StorageResult<TenantContext> {
        self.context(&TenantId::default_tenant())
    }

    /// The service registry shared by all features.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Returns `true` once the feature called `name` is configured.
    pub fn is_configured(&self, name: &str) -> bool {
        self.configured.lock().contains(name)
    }

    /// Registers a callback run once at shutdown, after the data sources are
    /// closed.
    pub fn on_shutdown<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shutdown_listeners.lock().push(Box::new(listener));
    }

    /// Closes every data source and runs the shutdown listeners. Only the
    /// first call does anything.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.data_sources.close_all().await;

        let listeners = std::mem::take(&mut *self.shutdown_listeners.lock());
        for listener in listeners {
            listener();
        }
        tracing::info!(app = %self.name, "application shut down");
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("name", &self.name)
            .field("multi_tenant", &self.config.multi_tenant)
            .field("tenants", &self.data_sources.tenants())
            .field("configured", &*self.configured.lock())
            .field("closed", &self.is_shut_down())
            .finish()
    }
}

impl fmt::Debug for AppBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("loader", &self.loader)
            .finish()
    }
}
