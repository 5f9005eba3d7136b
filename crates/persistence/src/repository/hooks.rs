//! Callbacks run before a repository writes an entity.

use std::fmt;
use std::sync::Arc;

use crate::error::StorageResult;

/// A callback that may adjust or reject an entity before it is written.
pub type Hook<T> = Arc<dyn Fn(&mut T) -> StorageResult<()> + Send + Sync>;

/// Hooks bound at repository construction.
///
/// `pre_create` runs before every create (once per element for batches),
/// `pre_update` before every update and merge. An error aborts the write.
pub struct RepoHooks<T> {
    pre_create: Option<Hook<T>>,
    pre_update: Option<Hook<T>>,
}

impl<T> RepoHooks<T> {
    /// No hooks.
    pub fn new() -> Self {
        Self {
            pre_create: None,
            pre_update: None,
        }
    }

    /// Sets the pre-create hook.
    pub fn with_pre_create(
        mut self,
        hook: impl Fn(&mut T) -> StorageResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.pre_create = Some(Arc::new(hook));
        self
    }

    /// Sets the pre-update hook.
    pub fn with_pre_update(
        mut self,
        hook: impl Fn(&mut T) -> StorageResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.pre_update = Some(Arc::new(hook));
        self
    }

    pub(crate) fn pre_create(&self, entity: &mut T) -> StorageResult<()> {
        match &self.pre_create {
            Some(hook) => hook(entity),
            None => Ok(()),
        }
    }

    pub(crate) fn pre_update(&self, entity: &mut T) -> StorageResult<()> {
        match &self.pre_update {
            Some(hook) => hook(entity),
            None => Ok(()),
        }
    }
}

impl<T> Default for RepoHooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for RepoHooks<T> {
    fn clone(&self) -> Self {
        Self {
            pre_create: self.pre_create.clone(),
            pre_update: self.pre_update.clone(),
        }
    }
}

impl<T> fmt::Debug for RepoHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoHooks")
            .field("pre_create", &self.pre_create.is_some())
            .field("pre_update", &self.pre_update.is_some())
            .finish()
    }
}
