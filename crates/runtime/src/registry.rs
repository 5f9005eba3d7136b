//! Process-wide service registry.
//!
//! Features publish long-lived collaborators (a scheduler, a mailer, ...)
//! under a well-known name during configuration; other features look them up
//! by name and type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Name under which the job scheduler is published.
pub const SCHEDULER: &str = "scheduler";
/// Name under which the mailer is published.
pub const MAILER: &str = "mailer";
/// Name under which the notifier is published.
pub const NOTIFIER: &str = "notifier";
/// Name under which the token provider is published.
pub const TOKEN_PROVIDER: &str = "token_provider";

/// String-keyed singletons shared across features.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `service` under `name`, replacing any previous entry.
    pub fn publish<T>(&self, name: impl Into<String>, service: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let name = name.into();
        tracing::debug!(service = %name, "service published");
        self.services.write().insert(name, service);
    }

    /// Looks up the service published under `name`.
    ///
    /// Returns `None` if nothing was published there or if it has another
    /// type.
    pub fn lookup<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let service = self.services.read().get(name).cloned()?;
        service.downcast::<T>().ok()
    }

    /// Returns `true` if something is published under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// The published names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
