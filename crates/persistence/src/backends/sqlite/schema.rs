//! Table introspection and migration bookkeeping for SQLite.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::{Connection, OptionalExtension, params};

use crate::core::MigrationScript;
use crate::error::{BackendError, StorageError, StorageResult};

use super::sql::quote;

/// How a column's stored value maps back to JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    /// Declared `BOOLEAN`; stored as `0`/`1`.
    Bool,
    /// Declared `JSON`; stored as text.
    Json,
    /// Anything else, read back as stored.
    #[default]
    Other,
}

impl ColumnKind {
    fn from_declared(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();
        if decl.contains("BOOL") {
            ColumnKind::Bool
        } else if decl.contains("JSON") {
            ColumnKind::Json
        } else {
            ColumnKind::Other
        }
    }
}

/// Column name → kind for one table.
pub(crate) type ColumnKinds = HashMap<String, ColumnKind>;

/// Per-data-source cache of column kinds, keyed by table.
#[derive(Debug, Default)]
pub(crate) struct ColumnCache {
    tables: RwLock<HashMap<String, Arc<ColumnKinds>>>,
}

impl ColumnCache {
    /// The kinds of `model`'s columns, loading them on first use.
    ///
    /// Unknown tables are not cached so a table created later is picked up.
    pub(crate) fn get(&self, conn: &Connection, model: &str) -> StorageResult<Arc<ColumnKinds>> {
        if let Some(kinds) = self.tables.read().get(model) {
            return Ok(Arc::clone(kinds));
        }

        let kinds = Arc::new(load_column_kinds(conn, model)?);
        if !kinds.is_empty() {
            self.tables
                .write()
                .insert(model.to_string(), Arc::clone(&kinds));
        }
        Ok(kinds)
    }

    /// Forgets everything, after DDL may have changed a table.
    pub(crate) fn clear(&self) {
        self.tables.write().clear();
    }
}

fn load_column_kinds(conn: &Connection, model: &str) -> StorageResult<ColumnKinds> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote(model)?))?;
    let columns = stmt.query_map([], |row| {
        let name: String = row.get(1)?;
        let decl: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
        Ok((name, ColumnKind::from_declared(&decl)))
    })?;

    let mut kinds = ColumnKinds::new();
    for column in columns {
        let (name, kind) = column?;
        kinds.insert(name, kind);
    }
    Ok(kinds)
}

/// Creates the tracking table if missing.
pub(crate) fn ensure_tracking_table(conn: &Connection, table: &str) -> StorageResult<()> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                source TEXT NOT NULL,
                version TEXT NOT NULL,
                applied_at TEXT NOT NULL,
                PRIMARY KEY (source, version)
            )",
            quote(table)?
        ),
        [],
    )
    .map_err(|e| {
        StorageError::Backend(BackendError::MigrationError {
            message: format!("failed to create tracking table {table}: {e}"),
        })
    })?;
    Ok(())
}

/// Returns `true` if `version` of `source` is recorded as applied.
pub(crate) fn is_applied(
    conn: &Connection,
    table: &str,
    source: &str,
    version: &str,
) -> StorageResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!(
                "SELECT 1 FROM {} WHERE source = ?1 AND version = ?2",
                quote(table)?
            ),
            params![source, version],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Runs one script and records it. The caller wraps both in a savepoint.
pub(crate) fn apply_script(
    conn: &Connection,
    table: &str,
    source: &str,
    script: &MigrationScript,
) -> StorageResult<()> {
    conn.execute_batch(&script.sql).map_err(|e| {
        StorageError::Backend(BackendError::MigrationError {
            message: format!("{source}/{}: {e}", script.version),
        })
    })?;
    conn.execute(
        &format!(
            "INSERT INTO {} (source, version, applied_at) VALUES (?1, ?2, ?3)",
            quote(table)?
        ),
        params![source, script.version, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Versions of `source` recorded in `table`, in version order.
pub(crate) fn applied_versions(
    conn: &Connection,
    table: &str,
    source: &str,
) -> StorageResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT version FROM {} WHERE source = ?1 ORDER BY version",
        quote(table)?
    ))?;
    let versions = stmt
        .query_map(params![source], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}
