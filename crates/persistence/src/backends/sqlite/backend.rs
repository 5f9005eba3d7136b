//! SQLite data source implementation.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::types::Value as SqliteValue;
use serde::{Deserialize, Serialize};

use crate::core::{DataSource, MigrationSource, TransactionWork};
use crate::error::{
    BackendError, ResourceError, StorageError, StorageResult, TransactionError,
};
use crate::tenant::TenantId;
use crate::types::{ID_COLUMN, Query, Row, SqlValue, expand_placeholders, validate_identifier};

use super::schema::{self, ColumnCache, ColumnKinds};
use super::sql;
use super::transaction::{RollbackGuard, TxState, atomically};

const BACKEND_NAME: &str = "sqlite";

/// Path that selects a private in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Placeholder substituted with the tenant id in a path template.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Configuration for SQLite data sources.
///
/// The `path` is a template: `{tenant}` is replaced by the sanitized tenant
/// id, so `data/{tenant}.db` gives every tenant its own database file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database path template, or `:memory:`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for file databases.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_path() -> String {
    MEMORY_PATH.to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// A configuration for a path template.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the busy timeout.
    pub fn with_busy_timeout_ms(mut self, timeout: u32) -> Self {
        self.busy_timeout_ms = timeout;
        self
    }

    /// Returns `true` if databases live in memory.
    pub fn is_memory(&self) -> bool {
        self.path == MEMORY_PATH
    }

    /// Returns `true` if the path varies by tenant.
    pub fn is_per_tenant(&self) -> bool {
        self.is_memory() || self.path.contains(TENANT_PLACEHOLDER)
    }

    /// The database path for `tenant`.
    pub fn resolve_path(&self, tenant: &TenantId) -> String {
        self.path.replace(TENANT_PLACEHOLDER, &tenant.sanitized())
    }
}

/// State shared by a data source and its transaction handles.
struct Shared {
    pool: RwLock<Option<Pool<SqliteConnectionManager>>>,
    columns: ColumnCache,
    path: String,
    closed: AtomicBool,
}

enum Target {
    Pool,
    Tx(Arc<TxState>),
}

/// A tenant's SQLite database behind an r2d2 pool.
///
/// In-memory databases use a single long-lived connection, so each
/// in-memory data source is a private database that lives until
/// [`close`](DataSource::close).
pub struct SqliteDataSource {
    tenant: TenantId,
    shared: Arc<Shared>,
    target: Target,
}

impl Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("tenant", &self.tenant)
            .field("path", &self.shared.path)
            .field("in_transaction", &matches!(self.target, Target::Tx(_)))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl SqliteDataSource {
    /// Opens a private in-memory database for `tenant`.
    pub fn in_memory(tenant: TenantId) -> StorageResult<Self> {
        Self::open(tenant, &SqliteConfig::default())
    }

    /// Opens the database for `tenant` described by `config`.
    pub fn open(tenant: TenantId, config: &SqliteConfig) -> StorageResult<Self> {
        let is_memory = config.is_memory();
        let path = config.resolve_path(&tenant);

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StorageError::Backend(BackendError::ConnectionFailed {
                            backend_name: BACKEND_NAME.to_string(),
                            message: format!("failed to create {}: {}", parent.display(), e),
                        })
                    })?;
                }
            }
            SqliteConnectionManager::file(&path)
        };

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let foreign_keys = config.enable_foreign_keys;
        let wal = config.enable_wal && !is_memory;
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            if foreign_keys {
                conn.execute_batch("PRAGMA foreign_keys = ON")?;
            }
            if wal {
                conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            }
            Ok(())
        });

        let builder = Pool::builder().connection_timeout(Duration::from_millis(
            config.connection_timeout_ms,
        ));
        let builder = if is_memory {
            // Every new connection would be a fresh, empty database.
            builder
                .max_size(1)
                .min_idle(Some(1))
                .max_lifetime(None)
                .idle_timeout(None)
        } else {
            builder
                .max_size(config.max_connections.max(1))
                .min_idle(Some(config.min_connections.min(config.max_connections)))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: BACKEND_NAME.to_string(),
                message: e.to_string(),
            })
        })?;

        tracing::debug!(tenant = %tenant, path = %path, "opened sqlite data source");

        Ok(Self {
            tenant,
            shared: Arc::new(Shared {
                pool: RwLock::new(Some(pool)),
                columns: ColumnCache::default(),
                path,
                closed: AtomicBool::new(false),
            }),
            target: Target::Pool,
        })
    }

    /// The resolved database path.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// Versions of `source` recorded as applied in `table`.
    pub fn applied_migrations(&self, source: &str, table: &str) -> StorageResult<Vec<String>> {
        validate_identifier(table)?;
        self.with_conn(|conn| {
            schema::ensure_tracking_table(conn, table)?;
            schema::applied_versions(conn, table, source)
        })
    }

    fn closed_error(&self) -> StorageError {
        StorageError::Backend(BackendError::Closed {
            tenant_id: self.tenant.clone(),
        })
    }

    /// Runs `f` on this handle's connection: the open transaction, or a
    /// pooled connection.
    fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> StorageResult<R>) -> StorageResult<R> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        match &self.target {
            Target::Tx(state) => state.with_conn(f),
            Target::Pool => {
                let pool = self
                    .shared
                    .pool
                    .read()
                    .clone()
                    .ok_or_else(|| self.closed_error())?;
                let conn = pool.get()?;
                f(&*conn)
            }
        }
    }

    fn kinds(&self, conn: &Connection, model: Option<&str>) -> StorageResult<Arc<ColumnKinds>> {
        match model {
            Some(model) => self.shared.columns.get(conn, validate_identifier(model)?),
            None => Ok(Arc::default()),
        }
    }

    fn insert_rows(&self, model: &str, rows: Vec<Row>, upsert: bool) -> StorageResult<u64> {
        validate_identifier(model)?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            atomically(conn, |conn| {
                let mut total = 0;
                for row in &rows {
                    let columns: Vec<&String> = row.keys().collect();
                    let statement = sql::insert(model, &columns, upsert)?;
                    let values = row.values().map(sql::to_sqlite).collect();
                    total += sql::execute_values(conn, &statement, values)
                        .map_err(|e| already_exists(e, model, row))?;
                }
                Ok(total)
            })
        })
    }
}

/// Maps a primary key violation on insert to `AlreadyExists`.
fn already_exists(err: StorageError, model: &str, row: &Row) -> StorageError {
    let is_pk_violation = match &err {
        StorageError::Backend(BackendError::Internal {
            source: Some(source),
            ..
        }) => matches!(
            source.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    };
    match (is_pk_violation, sql::row_id(row)) {
        (true, Ok(id)) => StorageError::Resource(ResourceError::AlreadyExists {
            model: model.to_string(),
            id: id.to_string(),
        }),
        _ => err,
    }
}

#[async_trait]
impl DataSource for SqliteDataSource {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn ping(&self) -> StorageResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |_| Ok(())).map_err(|e| {
                StorageError::Backend(BackendError::Unavailable {
                    backend_name: BACKEND_NAME.to_string(),
                    message: e.to_string(),
                })
            })
        })
    }

    async fn create(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64> {
        self.insert_rows(model, rows, false)
    }

    async fn save(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64> {
        self.insert_rows(model, rows, true)
    }

    async fn update(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64> {
        validate_identifier(model)?;
        if rows.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            atomically(conn, |conn| {
                let mut total = 0;
                for row in &rows {
                    let id = sql::row_id(row)?;
                    let columns: Vec<&String> =
                        row.keys().filter(|c| c.as_str() != ID_COLUMN).collect();
                    let changed = if columns.is_empty() {
                        sql::query_count(conn, &sql::count_by_id(model)?, &[SqlValue::from(id)])?
                    } else {
                        let statement = sql::update_by_id(model, &columns)?;
                        let mut values: Vec<SqliteValue> =
                            columns.iter().map(|c| sql::to_sqlite(&row[c.as_str()])).collect();
                        values.push(SqliteValue::Text(id.to_string()));
                        sql::execute_values(conn, &statement, values)?
                    };
                    if changed == 0 {
                        return Err(StorageError::not_found(model, id));
                    }
                    total += changed;
                }
                Ok(total)
            })
        })
    }

    async fn delete(&self, query: &Query) -> StorageResult<u64> {
        let (statement, args) = sql::delete(query)?;
        self.with_conn(|conn| sql::execute(conn, &statement, &args))
    }

    async fn patch(&self, model: &str, id: &str, fields: Row) -> StorageResult<u64> {
        validate_identifier(model)?;
        let columns: Vec<&String> = fields.keys().filter(|c| c.as_str() != ID_COLUMN).collect();
        self.with_conn(|conn| {
            if columns.is_empty() {
                return sql::query_count(conn, &sql::count_by_id(model)?, &[SqlValue::from(id)]);
            }
            let statement = sql::update_by_id(model, &columns)?;
            let mut values: Vec<SqliteValue> = columns
                .iter()
                .map(|c| sql::to_sqlite(&fields[c.as_str()]))
                .collect();
            values.push(SqliteValue::Text(id.to_string()));
            sql::execute_values(conn, &statement, values)
        })
    }

    async fn first(&self, query: &Query) -> StorageResult<Option<Row>> {
        let limited = if query.raw().is_some() {
            query.clone()
        } else {
            query.clone().with_limit(1)
        };
        let (statement, args) = sql::select(&limited)?;
        self.with_conn(|conn| {
            let kinds = self.kinds(conn, query.model())?;
            Ok(sql::query_rows(conn, &statement, &args, &kinds)?
                .into_iter()
                .next())
        })
    }

    async fn find(&self, query: &Query) -> StorageResult<Vec<Row>> {
        let (statement, args) = sql::select(query)?;
        self.with_conn(|conn| {
            let kinds = self.kinds(conn, query.model())?;
            sql::query_rows(conn, &statement, &args, &kinds)
        })
    }

    async fn count(&self, query: &Query) -> StorageResult<u64> {
        let (statement, args) = sql::count(query)?;
        self.with_conn(|conn| sql::query_count(conn, &statement, &args))
    }

    async fn raw(&self, statement: &str, args: Vec<SqlValue>) -> StorageResult<u64> {
        let (statement, args) = expand_placeholders(statement, &args)?;
        let changed = self.with_conn(|conn| {
            if args.is_empty() {
                let before = conn.total_changes();
                conn.execute_batch(&statement)?;
                Ok(conn.total_changes().saturating_sub(before))
            } else {
                sql::execute(conn, &statement, &args)
            }
        })?;
        self.shared.columns.clear();
        Ok(changed)
    }

    async fn transaction(&self, work: TransactionWork) -> StorageResult<()> {
        if matches!(self.target, Target::Tx(_)) {
            return Err(StorageError::Transaction(TransactionError::NestedNotSupported));
        }
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let pool = self
            .shared
            .pool
            .read()
            .clone()
            .ok_or_else(|| self.closed_error())?;
        let state = Arc::new(TxState::begin(pool.get()?)?);
        let _guard = RollbackGuard::new(Arc::clone(&state), &self.tenant);
        let handle: Arc<dyn DataSource> = Arc::new(SqliteDataSource {
            tenant: self.tenant.clone(),
            shared: Arc::clone(&self.shared),
            target: Target::Tx(Arc::clone(&state)),
        });

        match work(handle).await {
            Ok(()) => {
                state.commit()?;
                tracing::debug!(tenant = %self.tenant, "transaction committed");
                Ok(())
            }
            Err(e) => {
                if let Err(rollback) = state.rollback() {
                    tracing::warn!(tenant = %self.tenant, error = %rollback, "rollback failed");
                }
                tracing::debug!(tenant = %self.tenant, error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    async fn migrate(
        &self,
        source: &dyn MigrationSource,
        location: &str,
        table: &str,
    ) -> StorageResult<usize> {
        validate_identifier(table)?;
        let scripts = source.scripts(location)?;

        let applied = self.with_conn(|conn| {
            schema::ensure_tracking_table(conn, table)?;
            let mut applied = 0;
            for script in &scripts {
                if schema::is_applied(conn, table, source.name(), &script.version)? {
                    continue;
                }
                atomically(conn, |conn| {
                    schema::apply_script(conn, table, source.name(), script)
                })?;
                tracing::info!(
                    tenant = %self.tenant,
                    source = source.name(),
                    version = %script.version,
                    "applied migration"
                );
                applied += 1;
            }
            Ok(applied)
        });

        self.shared.columns.clear();
        applied
    }

    async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.pool.write().take();
        self.shared.columns.clear();
        tracing::info!(tenant = %self.tenant, "sqlite data source closed");
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}
