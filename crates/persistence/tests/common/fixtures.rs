//! Fixtures shared by the persistence integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use strata_persistence::args;
use strata_persistence::backends::sqlite::SqliteDataSource;
use strata_persistence::core::DataSource;
use strata_persistence::tenant::{TenantContext, TenantDataSources, TenantId};
use strata_persistence::types::Entity;

/// Schema of the `users` model.
pub const USERS_SCHEMA: &str = "CREATE TABLE users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    active BOOLEAN NOT NULL DEFAULT 1,
    age INTEGER,
    tags JSON
)";

/// A user record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub active: bool,
    pub age: Option<i64>,
    pub tags: Vec<String>,
}

impl User {
    /// A new active user without an id.
    pub fn new(name: &str, age: i64) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            active: true,
            age: Some(age),
            tags: vec![],
        }
    }

    /// Sets a fixed id.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Sets the tags.
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Marks the user inactive.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

impl Entity for User {
    const MODEL: &'static str = "users";
    const ID_PREFIX: &'static str = "usr";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// A projection of [`User`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub name: String,
}

/// An entity whose ids must be supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: String,
    pub value: String,
}

impl Entity for Setting {
    const MODEL: &'static str = "settings";
    const ID_PREFIX: &'static str = "";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// An in-memory data source for `tenant` with the `users` and `settings`
/// tables created.
pub async fn memory_source(tenant: &str) -> Arc<dyn DataSource> {
    let ds: Arc<dyn DataSource> = Arc::new(
        SqliteDataSource::in_memory(TenantId::new(tenant))
            .expect("Failed to create SQLite data source"),
    );
    ds.raw(USERS_SCHEMA, args![]).await.expect("Failed to create users");
    ds.raw(
        "CREATE TABLE settings (id TEXT PRIMARY KEY, value TEXT NOT NULL)",
        args![],
    )
    .await
    .expect("Failed to create settings");
    ds
}

/// A context over a fresh in-memory data source.
pub async fn create_context(tenant: &str) -> TenantContext {
    TenantContext::new(memory_source(tenant).await)
}

/// Data sources for the given tenants.
pub async fn create_sources(tenants: &[&str]) -> TenantDataSources {
    let mut sources = TenantDataSources::new();
    for tenant in tenants {
        sources
            .insert(memory_source(tenant).await)
            .expect("Failed to register data source");
    }
    sources
}
