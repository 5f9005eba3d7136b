//! Runtime configuration.
//!
//! Every setting can be given programmatically, on the command line, or
//! through the environment.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `STRATA_MULTI_TENANT` | false | Serve several tenants |
//! | `STRATA_TENANTS` | | Comma-separated tenants (`id` or `id\|description`) |
//! | `STRATA_DATABASE_URL` | :memory: | SQLite path template, `{tenant}` is substituted |
//! | `STRATA_MAX_CONNECTIONS` | 10 | Pool size per tenant |
//! | `STRATA_BUSY_TIMEOUT_MS` | 5000 | SQLite busy timeout |
//! | `STRATA_MIGRATIONS_TABLE` | _db_version | Migration tracking table |
//! | `STRATA_LOG_LEVEL` | info | Log level |
//!
//! # Example
//!
//! ```rust
//! use strata_runtime::RuntimeConfig;
//!
//! let config = RuntimeConfig {
//!     multi_tenant: true,
//!     tenants: Some("acme,beta".to_string()),
//!     database_url: "data/{tenant}.db".to_string(),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::ffi::OsString;

use clap::Parser;
use strata_persistence::backends::sqlite::{MEMORY_PATH, SqliteConfig, TENANT_PLACEHOLDER};
use strata_persistence::core::DEFAULT_MIGRATIONS_TABLE;
use strata_persistence::tenant::{FixedTenantLoader, TenantLoader};
use strata_persistence::types::validate_identifier;

use crate::error::{BootstrapError, BootstrapResult};

/// Configuration of a Strata application.
#[derive(Debug, Clone, Parser)]
#[command(name = "strata")]
#[command(about = "Multi-tenant application runtime")]
pub struct RuntimeConfig {
    /// Serve the tenants listed in `tenants` besides the default tenant.
    #[arg(long, env = "STRATA_MULTI_TENANT", default_value = "false")]
    pub multi_tenant: bool,

    /// Comma-separated tenant list; each entry is `id` or `id|description`.
    #[arg(long, env = "STRATA_TENANTS")]
    pub tenants: Option<String>,

    /// SQLite database path template, or `:memory:`.
    #[arg(long, env = "STRATA_DATABASE_URL", default_value = MEMORY_PATH)]
    pub database_url: String,

    /// Maximum pooled connections per tenant.
    #[arg(long, env = "STRATA_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// SQLite busy timeout in milliseconds.
    #[arg(long, env = "STRATA_BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u32,

    /// Table recording applied migrations.
    #[arg(long, env = "STRATA_MIGRATIONS_TABLE", default_value = DEFAULT_MIGRATIONS_TABLE)]
    pub migrations_table: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "STRATA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            multi_tenant: false,
            tenants: None,
            database_url: MEMORY_PATH.to_string(),
            max_connections: 10,
            busy_timeout_ms: 5000,
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Creates a configuration from the `STRATA_*` environment variables.
    ///
    /// The process arguments are not consulted. A variable that does not
    /// parse is an [`InvalidConfig`](BootstrapError::InvalidConfig) error.
    pub fn from_env() -> BootstrapResult<Self> {
        Self::from_args(["strata"])
    }

    /// Creates a configuration from command-line style `args`, the first
    /// being the program name. Unset options fall back to the environment.
    pub fn from_args<I, T>(args: I) -> BootstrapResult<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| {
            let message = e.to_string().trim_end().to_string();
            BootstrapError::InvalidConfig(vec![message])
        })
    }

    /// Checks the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        self.validate_with(&self.tenant_loader())
    }

    /// Like [`validate`](Self::validate), with the tenants coming from
    /// `loader` instead of `tenants`.
    pub(crate) fn validate_with(&self, loader: &dyn TenantLoader) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.multi_tenant && loader.tenants().is_empty() {
            errors.push("Multi-tenant mode requires at least one tenant".to_string());
        }

        if self.multi_tenant
            && self.database_url != MEMORY_PATH
            && !self.database_url.contains(TENANT_PLACEHOLDER)
        {
            errors.push(format!(
                "Database url must contain {} in multi-tenant mode",
                TENANT_PLACEHOLDER
            ));
        }

        if self.database_url.trim().is_empty() {
            errors.push("Database url cannot be empty".to_string());
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        if validate_identifier(&self.migrations_table).is_err() {
            errors.push(format!(
                "Invalid migrations table name: {}",
                self.migrations_table
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing: in-memory databases and
    /// verbose logging.
    pub fn for_testing() -> Self {
        Self {
            database_url: MEMORY_PATH.to_string(),
            max_connections: 4,
            busy_timeout_ms: 1000,
            log_level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// The tenants named by `tenants`. Single-tenant mode serves the default
    /// tenant only.
    pub fn tenant_loader(&self) -> FixedTenantLoader {
        if !self.multi_tenant {
            return FixedTenantLoader::single_tenant();
        }
        FixedTenantLoader::parse(self.tenants.as_deref().unwrap_or_default())
    }

    /// The SQLite settings shared by every tenant's data source.
    pub fn sqlite_config(&self) -> SqliteConfig {
        SqliteConfig::new(self.database_url.clone())
            .with_max_connections(self.max_connections)
            .with_busy_timeout_ms(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_persistence::tenant::TenantId;

    #[test]
    fn test_default_config() {
        let config = RuntimeConfig::default();
        assert!(!config.multi_tenant);
        assert_eq!(config.database_url, ":memory:");
        assert_eq!(config.migrations_table, "_db_version");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_multi_tenant_without_tenants() {
        let config = RuntimeConfig {
            multi_tenant: true,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("at least one tenant")));
    }

    #[test]
    fn test_validate_shared_database_file() {
        let config = RuntimeConfig {
            multi_tenant: true,
            tenants: Some("acme".to_string()),
            database_url: "data/app.db".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("{tenant}")));
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = RuntimeConfig {
            max_connections: 0,
            migrations_table: "bad table".to_string(),
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_tenant_loader() {
        let single = RuntimeConfig::default().tenant_loader();
        assert_eq!(single.tenants(), vec![TenantId::default_tenant()]);

        let multi = RuntimeConfig {
            multi_tenant: true,
            tenants: Some("acme|Acme Corp,beta".to_string()),
            ..Default::default()
        }
        .tenant_loader();
        assert_eq!(
            multi.tenants(),
            vec![TenantId::new("acme"), TenantId::new("beta")]
        );
    }

    #[test]
    fn test_sqlite_config() {
        let config = RuntimeConfig {
            database_url: "data/{tenant}.db".to_string(),
            max_connections: 3,
            ..Default::default()
        };
        let sqlite = config.sqlite_config();
        assert_eq!(sqlite.max_connections, 3);
        assert_eq!(sqlite.resolve_path(&TenantId::new("acme")), "data/acme.db");
    }

    #[test]
    fn test_from_args() {
        let config = RuntimeConfig::from_args([
            "strata",
            "--multi-tenant",
            "--tenants",
            "acme,beta",
            "--database-url",
            "data/{tenant}.db",
        ])
        .unwrap();
        assert!(config.multi_tenant);
        assert_eq!(config.tenants.as_deref(), Some("acme,beta"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_args_rejects_bad_values() {
        let err = RuntimeConfig::from_args(["strata", "--max-connections", "many"]).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidConfig(ref errors) if errors.len() == 1));
    }

    // The only test in this crate that touches the process environment.
    #[test]
    fn test_from_env_reads_variables_and_ignores_arguments() {
        // SAFETY: no other test in this binary reads or writes these variables.
        unsafe {
            std::env::set_var("STRATA_MULTI_TENANT", "true");
            std::env::set_var("STRATA_TENANTS", "acme,beta");
        }
        let config = RuntimeConfig::from_env();

        unsafe { std::env::set_var("STRATA_MAX_CONNECTIONS", "many") };
        let invalid = RuntimeConfig::from_env();

        unsafe {
            std::env::remove_var("STRATA_MULTI_TENANT");
            std::env::remove_var("STRATA_TENANTS");
            std::env::remove_var("STRATA_MAX_CONNECTIONS");
        }

        let config = config.unwrap();
        assert!(config.multi_tenant);
        assert_eq!(config.tenants.as_deref(), Some("acme,beta"));
        assert!(matches!(invalid, Err(BootstrapError::InvalidConfig(_))));
    }

    #[test]
    fn test_for_testing() {
        let config = RuntimeConfig::for_testing();
        assert_eq!(config.log_level, "debug");
        assert!(config.validate().is_ok());
    }
}
