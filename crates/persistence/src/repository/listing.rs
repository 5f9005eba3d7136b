//! Paged list and search over a repository.
//!
//! Both apply the page defaults of [`Paging`] and clip oversized pages
//! without complaint. Results are ordered by id unless a search supplies
//! its own sort, so consecutive pages never overlap.

use crate::error::{StorageResult, ValidationError};
use crate::types::{Entity, EntityList, FilterInput, ID_COLUMN, Paging, Query};

use super::binding::Binding;
use super::repo::Repository;

impl<T: Entity, B: Binding> Repository<T, B> {
    /// One page of all records, ordered by id.
    pub async fn list<'s>(
        &'s self,
        scope: B::Scope<'s>,
        paging: Paging,
    ) -> StorageResult<EntityList<T>> {
        let query = Query::for_model(T::MODEL)
            .with_sort(ID_COLUMN)
            .paginate(paging);
        let data = self.find(scope, query).await?;
        Ok(EntityList::new(data, paging))
    }

    /// One page of the records matching a free-form filter.
    ///
    /// Arguments without a where clause are rejected rather than ignored.
    pub async fn search<'s>(
        &'s self,
        scope: B::Scope<'s>,
        input: FilterInput,
    ) -> StorageResult<EntityList<T>> {
        let FilterInput {
            where_clause,
            args,
            sort,
            paging,
        } = input;

        let mut query = Query::for_model(T::MODEL)
            .with_sort(sort.unwrap_or_else(|| ID_COLUMN.to_string()))
            .paginate(paging);
        match where_clause {
            Some(filter) => query = query.with_filter(filter, args),
            None if !args.is_empty() => {
                return Err(ValidationError::ArgumentMismatch {
                    expected: 0,
                    actual: args.len(),
                }
                .into());
            }
            None => {}
        }

        tracing::debug!(
            model = T::MODEL,
            page = paging.page(),
            count = paging.count(),
            "search"
        );
        let data = self.find(scope, query).await?;
        Ok(EntityList::new(data, paging))
    }
}
