//! Application features and their dependency order.
//!
//! A [`Feature`] is a unit of application functionality: it may ship
//! migration scripts, depend on other features and run a configuration
//! callback once the schema it needs is in place. Features are identified by
//! name, so two values with the same name are the same feature.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use strata_persistence::core::MigrationSource;

use crate::app::App;
use crate::error::{BootstrapError, BootstrapResult};

/// Configuration callback of a feature.
pub type Configure = Box<dyn Fn(&App) -> anyhow::Result<()> + Send + Sync>;

/// A named unit of functionality with optional migrations and configuration.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use strata_persistence::core::StaticMigrationSource;
/// use strata_runtime::Feature;
///
/// let accounts = Arc::new(
///     Feature::new("accounts").with_migrations(Arc::new(
///         StaticMigrationSource::new("accounts")
///             .script("db", "0001", "CREATE TABLE accounts (id TEXT PRIMARY KEY)"),
///     )),
/// );
/// let billing = Feature::new("billing").depends_on(accounts);
/// assert_eq!(billing.dependencies().len(), 1);
/// ```
pub struct Feature {
    name: String,
    depends_on: Vec<Arc<Feature>>,
    migrations: Option<Arc<dyn MigrationSource>>,
    configure: Option<Configure>,
}

impl Feature {
    /// Creates a feature with no dependencies, migrations or callback.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            depends_on: Vec::new(),
            migrations: None,
            configure: None,
        }
    }

    /// Adds a feature that must be configured first.
    pub fn depends_on(mut self, feature: Arc<Feature>) -> Self {
        self.depends_on.push(feature);
        self
    }

    /// Sets the scripts applied to every tenant before configuration.
    pub fn with_migrations(mut self, source: Arc<dyn MigrationSource>) -> Self {
        self.migrations = Some(source);
        self
    }

    /// Sets the callback run once the feature's migrations are applied.
    pub fn on_configure<F>(mut self, configure: F) -> Self
    where
        F: Fn(&App) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    /// The feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct dependencies, in declaration order.
    pub fn dependencies(&self) -> &[Arc<Feature>] {
        &self.depends_on
    }

    /// The migration scripts, if any.
    pub fn migrations(&self) -> Option<&Arc<dyn MigrationSource>> {
        self.migrations.as_ref()
    }

    pub(crate) fn configure(&self, app: &App) -> anyhow::Result<()> {
        match &self.configure {
            Some(configure) => configure(app),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depends_on: Vec<&str> = self.depends_on.iter().map(|d| d.name()).collect();
        f.debug_struct("Feature")
            .field("name", &self.name)
            .field("depends_on", &depends_on)
            .field("migrations", &self.migrations.as_ref().map(|m| m.name()))
            .field("configure", &self.configure.is_some())
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Orders `requested` and everything they depend on so that every feature
/// comes after its dependencies.
///
/// Features named in `configured` are skipped together with their
/// dependencies. Each remaining feature appears once, however many paths
/// reach it. A cycle fails with the chain of names that closes it.
pub fn resolve_order(
    requested: &[Arc<Feature>],
    configured: &HashSet<String>,
) -> BootstrapResult<Vec<Arc<Feature>>> {
    let mut walk = Walk {
        configured,
        marks: HashMap::new(),
        path: Vec::new(),
        order: Vec::new(),
    };
    for feature in requested {
        walk.visit(feature)?;
    }
    Ok(walk.order)
}

struct Walk<'a> {
    configured: &'a HashSet<String>,
    marks: HashMap<String, Mark>,
    path: Vec<String>,
    order: Vec<Arc<Feature>>,
}

impl Walk<'_> {
    fn visit(&mut self, feature: &Arc<Feature>) -> BootstrapResult<()> {
        let name = feature.name();
        if self.configured.contains(name) {
            return Ok(());
        }

        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = self.path.iter().position(|n| n == name).unwrap_or(0);
                let mut chain = self.path[start..].to_vec();
                chain.push(name.to_string());
                return Err(BootstrapError::DependencyCycle {
                    chain: chain.join(" -> "),
                });
            }
            None => {}
        }

        self.marks.insert(name.to_string(), Mark::Visiting);
        self.path.push(name.to_string());

        for dependency in feature.dependencies() {
            self.visit(dependency)?;
        }

        self.path.pop();
        self.marks.insert(name.to_string(), Mark::Done);
        self.order.push(Arc::clone(feature));
        Ok(())
    }
}
