//! Versioned migration scripts.
//!
//! A [`MigrationSource`] hands out ordered SQL scripts grouped by location.
//! Data sources apply each script at most once per tenant and record it in a
//! tracking table.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackendError, StorageResult};

/// Tracking table used when none is configured.
pub const DEFAULT_MIGRATIONS_TABLE: &str = "_db_version";

/// Location of scripts applied to the default tenant in multi-tenant mode.
pub const SHARED_LOCATION: &str = "db/shared";

/// Location of scripts applied to every non-default tenant.
pub const TENANT_LOCATION: &str = "db/tenant";

/// Location of scripts in single-tenant mode.
pub const SINGLE_LOCATION: &str = "db";

/// One versioned script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationScript {
    /// Version key, unique within its source. Scripts apply in key order.
    pub version: String,
    /// The SQL to run. May contain several statements.
    pub sql: String,
}

impl MigrationScript {
    /// Creates a script.
    pub fn new(version: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            sql: sql.into(),
        }
    }
}

/// An ordered collection of scripts.
pub trait MigrationSource: Send + Sync + Debug {
    /// Name recorded in the tracking table. Two sources with the same name
    /// share their applied versions.
    fn name(&self) -> &str;

    /// The scripts at `location`, in apply order. An unknown location has no
    /// scripts.
    fn scripts(&self, location: &str) -> StorageResult<Vec<MigrationScript>>;
}

/// Scripts read from `<root>/<location>/*.sql`, ordered by file name.
///
/// The version of each script is its file stem, so `0001_users.sql` is
/// version `0001_users`.
#[derive(Debug, Clone)]
pub struct DirMigrationSource {
    name: String,
    root: PathBuf,
}

impl DirMigrationSource {
    /// Creates a source rooted at `root`.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MigrationSource for DirMigrationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn scripts(&self, location: &str) -> StorageResult<Vec<MigrationScript>> {
        let dir = self.root.join(location);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let read_failed = |path: &Path, e: std::io::Error| BackendError::MigrationError {
            message: format!("failed to read {}: {}", path.display(), e),
        };

        let mut files = BTreeMap::new();
        for entry in fs::read_dir(&dir).map_err(|e| read_failed(&dir, e))? {
            let path = entry.map_err(|e| read_failed(&dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("sql") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                files.insert(stem.to_string(), path.clone());
            }
        }

        let mut scripts = Vec::with_capacity(files.len());
        for (version, path) in files {
            let sql = fs::read_to_string(&path).map_err(|e| read_failed(&path, e))?;
            scripts.push(MigrationScript { version, sql });
        }
        Ok(scripts)
    }
}

/// Scripts held in memory, for features that embed their schema.
///
/// ```
/// use strata_persistence::core::{MigrationSource, StaticMigrationSource};
///
/// let source = StaticMigrationSource::new("billing")
///     .script("db/tenant", "0001_invoices", "CREATE TABLE invoices (id TEXT PRIMARY KEY)");
///
/// assert_eq!(source.scripts("db/tenant").unwrap().len(), 1);
/// assert!(source.scripts("db/shared").unwrap().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticMigrationSource {
    name: String,
    locations: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticMigrationSource {
    /// Creates an empty source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locations: BTreeMap::new(),
        }
    }

    /// Adds a script at `location`.
    pub fn script(
        mut self,
        location: impl Into<String>,
        version: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        self.locations
            .entry(location.into())
            .or_default()
            .insert(version.into(), sql.into());
        self
    }
}

impl MigrationSource for StaticMigrationSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn scripts(&self, location: &str) -> StorageResult<Vec<MigrationScript>> {
        Ok(self
            .locations
            .get(location)
            .map(|scripts| {
                scripts
                    .iter()
                    .map(|(version, sql)| MigrationScript::new(version.clone(), sql.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
