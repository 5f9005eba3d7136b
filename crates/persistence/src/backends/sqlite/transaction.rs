//! Transaction support for the SQLite data source.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::{StorageError, StorageResult, TransactionError};
use crate::tenant::TenantId;

const SAVEPOINT: &str = "strata_batch";

/// The connection of an open transaction.
///
/// The state is shared between the data source running the transaction and
/// the handle passed to the work closure. Once the transaction ends the
/// handle becomes invalid, even if the closure leaked it, and the connection
/// goes back to the pool.
pub(crate) struct TxState {
    conn: Mutex<Option<PooledConnection<SqliteConnectionManager>>>,
    active: AtomicBool,
}

impl std::fmt::Debug for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxState")
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl TxState {
    /// Starts a transaction on a pooled connection.
    pub(crate) fn begin(conn: PooledConnection<SqliteConnectionManager>) -> StorageResult<Self> {
        conn.execute_batch("BEGIN IMMEDIATE").map_err(|e| {
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("failed to begin transaction: {e}"),
            })
        })?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            active: AtomicBool::new(true),
        })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Runs `f` on the transaction's connection.
    pub(crate) fn with_conn<R>(
        &self,
        f: impl FnOnce(&Connection) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let guard = self.conn.lock();
        match guard.as_ref() {
            Some(conn) if self.is_active() => f(&**conn),
            _ => Err(StorageError::Transaction(TransactionError::InvalidTransaction)),
        }
    }

    /// Commits. If the commit itself fails the transaction is rolled back.
    pub(crate) fn commit(&self) -> StorageResult<()> {
        self.finish("COMMIT", true)
    }

    /// Rolls back.
    pub(crate) fn rollback(&self) -> StorageResult<()> {
        self.finish("ROLLBACK", false)
    }

    /// Ends the transaction and releases the connection back to the pool.
    fn finish(&self, statement: &str, rollback_on_failure: bool) -> StorageResult<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Err(StorageError::Transaction(TransactionError::InvalidTransaction));
        }
        let Some(conn) = self.conn.lock().take() else {
            return Err(StorageError::Transaction(TransactionError::InvalidTransaction));
        };
        conn.execute_batch(statement).map_err(|e| {
            if rollback_on_failure {
                let _ = conn.execute_batch("ROLLBACK");
            }
            StorageError::Transaction(TransactionError::RolledBack {
                reason: format!("{} failed: {e}", statement.to_lowercase()),
            })
        })
    }
}

/// Rolls an open transaction back when dropped.
///
/// Covers work that panics or whose future is dropped before it finishes.
/// After a commit or rollback the guard does nothing.
pub(crate) struct RollbackGuard<'a> {
    state: Arc<TxState>,
    tenant: &'a TenantId,
}

impl<'a> RollbackGuard<'a> {
    pub(crate) fn new(state: Arc<TxState>, tenant: &'a TenantId) -> Self {
        Self { state, tenant }
    }
}

impl Drop for RollbackGuard<'_> {
    fn drop(&mut self) {
        if !self.state.is_active() {
            return;
        }
        match self.state.rollback() {
            Ok(()) => tracing::warn!(tenant = %self.tenant, "abandoned transaction rolled back"),
            Err(e) => tracing::warn!(
                tenant = %self.tenant,
                error = %e,
                "abandoned transaction rollback failed"
            ),
        }
    }
}

/// Runs `f` atomically: either everything it wrote stays or nothing does.
///
/// Uses a savepoint, so it works both on a plain connection and inside an
/// open transaction.
pub(crate) fn atomically<R>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> StorageResult<R>,
) -> StorageResult<R> {
    conn.execute_batch(&format!("SAVEPOINT {SAVEPOINT}"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {SAVEPOINT}"))?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch(&format!("ROLLBACK TO {SAVEPOINT}; RELEASE {SAVEPOINT}"));
            Err(e)
        }
    }
}
