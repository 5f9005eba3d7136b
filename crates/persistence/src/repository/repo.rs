//! The generic typed repository.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::args;
use crate::core::DataSource;
use crate::error::{StorageError, StorageResult};
use crate::tenant::{TenantDataSources, TenantId};
use crate::types::{Entity, Query, Row, SqlValue};

use super::binding::{Binding, ContextBinding, TenantBinding};
use super::hooks::RepoHooks;

const ID_FILTER: &str = "id = ?";
const IDS_FILTER: &str = "id in (?)";

/// Typed CRUD over one entity type.
///
/// `B` decides where the data source comes from on each call; every
/// operation takes the binding's scope as its first argument.
pub struct Repository<T: Entity, B: Binding = ContextBinding> {
    binding: B,
    hooks: RepoHooks<T>,
    _entity: PhantomData<fn() -> T>,
}

/// A repository resolving its data source from the call's
/// [`TenantContext`](crate::tenant::TenantContext).
pub type ContextRepo<T> = Repository<T, ContextBinding>;

/// A repository bound to one tenant's data source.
pub type TenantRepo<T> = Repository<T, TenantBinding>;

impl<T: Entity> Repository<T, ContextBinding> {
    /// Creates a context-bound repository.
    pub fn new() -> Self {
        Self::with_binding(ContextBinding)
    }
}

impl<T: Entity> Default for Repository<T, ContextBinding> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Repository<T, TenantBinding> {
    /// Creates a repository bound to `data_source`.
    pub fn bound(data_source: Arc<dyn DataSource>) -> Self {
        Self::with_binding(TenantBinding::new(data_source))
    }

    /// Creates a repository bound to `tenant`'s data source.
    ///
    /// Fails if the tenant has no data source.
    pub fn for_tenant(sources: &TenantDataSources, tenant: &TenantId) -> StorageResult<Self> {
        Ok(Self::with_binding(TenantBinding::for_tenant(sources, tenant)?))
    }

    /// The bound data source.
    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        self.binding.data_source()
    }
}

impl<T: Entity, B: Binding + Clone> Clone for Repository<T, B> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding.clone(),
            hooks: self.hooks.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity, B: Binding + fmt::Debug> fmt::Debug for Repository<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("model", &T::MODEL)
            .field("binding", &self.binding)
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<T: Entity, B: Binding> Repository<T, B> {
    /// Creates a repository over an explicit binding.
    pub fn with_binding(binding: B) -> Self {
        Self {
            binding,
            hooks: RepoHooks::new(),
            _entity: PhantomData,
        }
    }

    /// Replaces all hooks.
    pub fn with_hooks(mut self, hooks: RepoHooks<T>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Sets the hook run before every create.
    pub fn with_pre_create(
        mut self,
        hook: impl Fn(&mut T) -> StorageResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks = self.hooks.with_pre_create(hook);
        self
    }

    /// Sets the hook run before every update and merge.
    pub fn with_pre_update(
        mut self,
        hook: impl Fn(&mut T) -> StorageResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks = self.hooks.with_pre_update(hook);
        self
    }

    /// The model this repository reads and writes.
    pub fn model(&self) -> &'static str {
        T::MODEL
    }

    fn prepare_create(&self, entity: &mut T) -> StorageResult<Row> {
        entity.ensure_id()?;
        self.hooks.pre_create(entity)?;
        entity.to_row()
    }

    fn prepare_update(&self, entity: &mut T) -> StorageResult<Row> {
        self.hooks.pre_update(entity)?;
        entity.to_row()
    }

    fn decode(rows: Vec<Row>) -> StorageResult<Vec<T>> {
        rows.into_iter().map(T::from_row).collect()
    }

    fn decode_into<P: DeserializeOwned>(rows: Vec<Row>) -> StorageResult<Vec<P>> {
        rows.into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).map_err(StorageError::from))
            .collect()
    }

    fn by_filter(filter: &str, args: Vec<SqlValue>) -> Query {
        Query::for_model(T::MODEL).with_filter(filter, args)
    }

    /// Assigns an id if missing, runs the pre-create hook and inserts the
    /// entity. Returns the entity as stored.
    pub async fn create<'s>(&'s self, scope: B::Scope<'s>, mut entity: T) -> StorageResult<T> {
        let row = self.prepare_create(&mut entity)?;
        self.binding.resolve(scope).create(T::MODEL, vec![row]).await?;
        Ok(entity)
    }

    /// Creates every entity in one batch; either all are stored or none.
    pub async fn create_all<'s>(
        &'s self,
        scope: B::Scope<'s>,
        mut entities: Vec<T>,
    ) -> StorageResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let rows = entities
            .iter_mut()
            .map(|entity| self.prepare_create(entity))
            .collect::<StorageResult<Vec<_>>>()?;
        self.binding.resolve(scope).create(T::MODEL, rows).await?;
        Ok(entities)
    }

    /// Overwrites the stored record with the same id. Last writer wins.
    pub async fn update<'s>(&'s self, scope: B::Scope<'s>, mut entity: T) -> StorageResult<T> {
        let row = self.prepare_update(&mut entity)?;
        self.binding.resolve(scope).update(T::MODEL, vec![row]).await?;
        Ok(entity)
    }

    /// Overwrites every entity in one batch; either all are stored or none.
    pub async fn update_all<'s>(
        &'s self,
        scope: B::Scope<'s>,
        mut entities: Vec<T>,
    ) -> StorageResult<Vec<T>> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let rows = entities
            .iter_mut()
            .map(|entity| self.prepare_update(entity))
            .collect::<StorageResult<Vec<_>>>()?;
        self.binding.resolve(scope).update(T::MODEL, rows).await?;
        Ok(entities)
    }

    /// Loads the entity with `id`, applies `mutate` and stores the result.
    ///
    /// Fails with `NotFound` without writing if the id does not exist. The
    /// id itself cannot be changed by `mutate`.
    pub async fn merge<'s, F>(
        &'s self,
        scope: B::Scope<'s>,
        id: &str,
        mutate: F,
    ) -> StorageResult<T>
    where
        F: FnOnce(&mut T) -> StorageResult<()> + Send,
    {
        let mut entity = self
            .find_by_id(scope, id)
            .await?
            .ok_or_else(|| StorageError::not_found(T::MODEL, id))?;
        mutate(&mut entity)?;
        entity.set_id(id.to_string());
        self.update(scope, entity).await
    }

    /// Updates only `fields` of the record with `id`. Returns the number of
    /// records changed; `0` means no such id.
    pub async fn patch<'s>(
        &'s self,
        scope: B::Scope<'s>,
        id: &str,
        fields: Row,
    ) -> StorageResult<u64> {
        self.binding.resolve(scope).patch(T::MODEL, id, fields).await
    }

    /// Deletes the record with `id`, if any.
    pub async fn delete_by_id<'s>(&'s self, scope: B::Scope<'s>, id: &str) -> StorageResult<()> {
        self.delete_by(scope, ID_FILTER, args![id]).await
    }

    /// Deletes the records matching `filter`.
    pub async fn delete_by<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<()> {
        let deleted = self
            .binding
            .resolve(scope)
            .delete(&Self::by_filter(filter, args))
            .await?;
        tracing::debug!(model = T::MODEL, deleted, "deleted records");
        Ok(())
    }

    /// Runs `query` against this repository's model.
    pub async fn find<'s>(&'s self, scope: B::Scope<'s>, query: Query) -> StorageResult<Vec<T>> {
        let rows = self
            .binding
            .resolve(scope)
            .find(&query.with_model(T::MODEL))
            .await?;
        Self::decode(rows)
    }

    /// Every record.
    pub async fn find_all<'s>(&'s self, scope: B::Scope<'s>) -> StorageResult<Vec<T>> {
        self.find(scope, Query::for_model(T::MODEL)).await
    }

    /// Every record, ordered by `sort`.
    pub async fn find_all_sorted<'s>(
        &'s self,
        scope: B::Scope<'s>,
        sort: &str,
    ) -> StorageResult<Vec<T>> {
        self.find(scope, Query::for_model(T::MODEL).with_sort(sort))
            .await
    }

    /// The record with `id`, if any.
    pub async fn find_by_id<'s>(
        &'s self,
        scope: B::Scope<'s>,
        id: &str,
    ) -> StorageResult<Option<T>> {
        self.first_by(scope, ID_FILTER, args![id]).await
    }

    /// The records whose id is in `ids`. Missing ids are skipped.
    pub async fn find_by_ids<'s, I>(
        &'s self,
        scope: B::Scope<'s>,
        ids: &[I],
    ) -> StorageResult<Vec<T>>
    where
        I: AsRef<str> + Sync,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
        self.find_by(scope, IDS_FILTER, args![ids]).await
    }

    /// Returns `true` if a record with `id` exists.
    pub async fn exists_by_id<'s>(&'s self, scope: B::Scope<'s>, id: &str) -> StorageResult<bool> {
        self.exists_by(scope, ID_FILTER, args![id]).await
    }

    /// The records matching `filter`.
    pub async fn find_by<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<Vec<T>> {
        self.find(scope, Self::by_filter(filter, args)).await
    }

    /// The records matching `filter`, ordered by `sort`.
    pub async fn find_by_sorted<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
        sort: &str,
    ) -> StorageResult<Vec<T>> {
        self.find(scope, Self::by_filter(filter, args).with_sort(sort))
            .await
    }

    /// The records matching `filter`, deserialized into `P` instead of `T`.
    ///
    /// Columns `P` does not declare are ignored.
    pub async fn find_by_into<'s, P: DeserializeOwned>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<Vec<P>> {
        let rows = self
            .binding
            .resolve(scope)
            .find(&Self::by_filter(filter, args))
            .await?;
        Self::decode_into(rows)
    }

    /// The first record matching `filter`, if any.
    pub async fn first_by<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<Option<T>> {
        self.binding
            .resolve(scope)
            .first(&Self::by_filter(filter, args))
            .await?
            .map(T::from_row)
            .transpose()
    }

    /// Returns `true` if any record matches `filter`.
    pub async fn exists_by<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<bool> {
        self.binding
            .resolve(scope)
            .exists(&Self::by_filter(filter, args))
            .await
    }

    /// Number of records matching `filter`.
    pub async fn count_by<'s>(
        &'s self,
        scope: B::Scope<'s>,
        filter: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<u64> {
        self.binding
            .resolve(scope)
            .count(&Self::by_filter(filter, args))
            .await
    }

    /// Number of records.
    pub async fn count_all<'s>(&'s self, scope: B::Scope<'s>) -> StorageResult<u64> {
        self.binding
            .resolve(scope)
            .count(&Query::for_model(T::MODEL))
            .await
    }

    /// Runs a raw `SELECT` and deserializes each row into `P`.
    ///
    /// Column types are restored using this repository's model, so boolean
    /// and JSON columns of `T` come back typed.
    pub async fn query<'s, P: DeserializeOwned>(
        &'s self,
        scope: B::Scope<'s>,
        sql: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<Vec<P>> {
        let rows = self
            .binding
            .resolve(scope)
            .find(&Query::raw_statement(sql, args).with_model(T::MODEL))
            .await?;
        Self::decode_into(rows)
    }

    /// Runs a raw statement. Returns the number of rows affected.
    pub async fn raw<'s>(
        &'s self,
        scope: B::Scope<'s>,
        sql: &str,
        args: Vec<SqlValue>,
    ) -> StorageResult<u64> {
        self.binding.resolve(scope).raw(sql, args).await
    }
}
