//! The per-tenant data source abstraction.
//!
//! A [`DataSource`] is a tenant-bound handle to that tenant's physical
//! storage. It offers untyped row operations driven by [`Query`]
//! descriptors; typed access lives in [`crate::repository`].

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::StorageResult;
use crate::tenant::TenantId;
use crate::types::{Query, Row, SqlValue};

use super::migration::MigrationSource;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Work run inside a transaction. It receives a handle that routes every
/// operation through the open transaction.
pub type TransactionWork =
    Box<dyn FnOnce(Arc<dyn DataSource>) -> BoxFuture<'static, StorageResult<()>> + Send>;

/// Storage handle bound to exactly one tenant.
///
/// All operations fail with
/// [`BackendError::Closed`](crate::error::BackendError::Closed) once
/// [`close`](DataSource::close) has been called.
///
/// # Example
///
/// ```ignore
/// use strata_persistence::args;
/// use strata_persistence::core::DataSource;
/// use strata_persistence::types::Query;
///
/// async fn adults(ds: &dyn DataSource) -> StorageResult<u64> {
///     ds.count(&Query::for_model("users").with_filter("age >= ?", args![18])).await
/// }
/// ```
#[async_trait]
pub trait DataSource: Send + Sync + Debug {
    /// The tenant this data source serves.
    fn tenant(&self) -> &TenantId;

    /// A human-readable backend name.
    fn backend_name(&self) -> &'static str;

    /// Checks that storage is reachable.
    async fn ping(&self) -> StorageResult<()>;

    /// Inserts rows into `model` as one batch. Either every row is inserted
    /// or none is.
    async fn create(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64>;

    /// Inserts or replaces rows by id.
    async fn save(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64>;

    /// Overwrites existing rows by id with every supplied column.
    ///
    /// Fails with `NotFound` if any id does not exist, in which case nothing
    /// is written.
    async fn update(&self, model: &str, rows: Vec<Row>) -> StorageResult<u64>;

    /// Deletes the rows matching the query's filter.
    ///
    /// A query without a filter is rejected rather than wiping the model.
    async fn delete(&self, query: &Query) -> StorageResult<u64>;

    /// Updates only the given columns of the row with `id`. Returns the number
    /// of rows affected.
    async fn patch(&self, model: &str, id: &str, fields: Row) -> StorageResult<u64>;

    /// The first row matching the query.
    async fn first(&self, query: &Query) -> StorageResult<Option<Row>>;

    /// Every row matching the query.
    async fn find(&self, query: &Query) -> StorageResult<Vec<Row>>;

    /// Number of rows matching the query.
    async fn count(&self, query: &Query) -> StorageResult<u64>;

    /// Runs a raw statement and returns the number of rows affected.
    async fn raw(&self, sql: &str, args: Vec<SqlValue>) -> StorageResult<u64>;

    /// Runs `work` in a transaction: committed if it returns `Ok`, rolled
    /// back otherwise.
    async fn transaction(&self, work: TransactionWork) -> StorageResult<()>;

    /// Applies pending scripts from `source` at `location`, recording them in
    /// `table`. Returns the number of scripts applied.
    async fn migrate(
        &self,
        source: &dyn MigrationSource,
        location: &str,
        table: &str,
    ) -> StorageResult<usize>;

    /// Releases the underlying connections. Idempotent.
    async fn close(&self);

    /// Returns `true` once closed.
    fn is_closed(&self) -> bool;

    /// The first row of `model` matching `filter`.
    async fn first_by(
        &self,
        model: &str,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<Option<Row>> {
        self.first(&Query::for_model(model).with_filter(filter, args)).await
    }

    /// Every row of a model.
    async fn find_all(&self, model: &str) -> StorageResult<Vec<Row>> {
        self.find(&Query::for_model(model)).await
    }

    /// Returns `true` if any row matches the query.
    async fn exists(&self, query: &Query) -> StorageResult<bool> {
        Ok(self.first(&query.clone().with_select("1")).await?.is_some())
    }

    /// Runs the query's raw statement and returns the rows affected.
    async fn execute(&self, query: &Query) -> StorageResult<u64> {
        match query.raw() {
            Some(sql) => self.raw(sql, query.args().to_vec()).await,
            None => Err(crate::error::ValidationError::MissingStatement {
                operation: "execute".to_string(),
            }
            .into()),
        }
    }
}

/// Boxes an async closure as [`TransactionWork`].
pub fn transaction_work<F, Fut>(work: F) -> TransactionWork
where
    F: FnOnce(Arc<dyn DataSource>) -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<()>> + Send + 'static,
{
    Box::new(move |tx: Arc<dyn DataSource>| -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(work(tx))
    })
}

/// Runs `work` in a transaction on `data_source` and returns its output.
///
/// # Example
///
/// ```ignore
/// let created = run_in_transaction(ds.as_ref(), |tx| async move {
///     tx.create("users", vec![row]).await
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<F, Fut, R>(
    data_source: &dyn DataSource,
    work: F,
) -> StorageResult<R>
where
    F: FnOnce(Arc<dyn DataSource>) -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<R>> + Send + 'static,
    R: Send + 'static,
{
    let slot: Arc<Mutex<Option<R>>> = Arc::new(Mutex::new(None));
    let out = Arc::clone(&slot);
    data_source
        .transaction(transaction_work(move |tx| async move {
            let value = work(tx).await?;
            *out.lock() = Some(value);
            Ok(())
        }))
        .await?;
    let value = slot.lock().take();
    value.ok_or_else(|| {
        crate::error::TransactionError::RolledBack {
            reason: "transaction produced no result".to_string(),
        }
        .into()
    })
}
