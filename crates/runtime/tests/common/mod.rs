//! Test infrastructure for the runtime.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use strata_persistence::args;
use strata_persistence::core::{DEFAULT_MIGRATIONS_TABLE, DataSource, StaticMigrationSource};
use strata_persistence::types::{Entity, Query};
use strata_runtime::{App, Feature, RuntimeConfig};

/// A multi-tenant configuration serving `acme` and `beta` from memory.
pub fn multi_tenant_config() -> RuntimeConfig {
    RuntimeConfig {
        multi_tenant: true,
        tenants: Some("acme|Acme Corp,beta|Beta Ltd".to_string()),
        ..RuntimeConfig::for_testing()
    }
}

/// Builds an application from `config`.
pub fn build_app(config: RuntimeConfig) -> App {
    App::builder("test-app")
        .with_config(config)
        .build()
        .expect("failed to build app")
}

/// Scripts of the `accounts` feature for every location.
pub fn accounts_migrations() -> StaticMigrationSource {
    StaticMigrationSource::new("accounts")
        .script(
            "db/shared",
            "0001_plans",
            "CREATE TABLE plans (id TEXT PRIMARY KEY, name TEXT NOT NULL)",
        )
        .script(
            "db/tenant",
            "0001_members",
            "CREATE TABLE members (id TEXT PRIMARY KEY, name TEXT NOT NULL)",
        )
        .script(
            "db/tenant",
            "0002_members_email",
            "ALTER TABLE members ADD COLUMN email TEXT",
        )
        .script(
            "db",
            "0001_members",
            "CREATE TABLE members (id TEXT PRIMARY KEY, name TEXT NOT NULL, email TEXT)",
        )
}

/// The `accounts` feature with its migrations.
pub fn accounts_feature() -> Arc<Feature> {
    Arc::new(Feature::new("accounts").with_migrations(Arc::new(accounts_migrations())))
}

/// A feature that counts how often it is configured.
pub fn counting_feature(name: &str, counter: Arc<AtomicUsize>) -> Feature {
    Feature::new(name).on_configure(move |_app| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

/// Versions of `source` recorded in the tracking table, in order.
pub async fn applied_versions(ds: &Arc<dyn DataSource>, source: &str) -> Vec<String> {
    let rows = ds
        .find(
            &Query::for_model(DEFAULT_MIGRATIONS_TABLE)
                .with_filter("source = ?", args![source])
                .with_sort("version"),
        )
        .await
        .expect("failed to read tracking table");
    rows.iter()
        .filter_map(|row| row.get("version").and_then(|v| v.as_str()))
        .map(str::to_string)
        .collect()
}

/// Returns `true` if `table` exists in the data source.
pub async fn table_exists(ds: &Arc<dyn DataSource>, table: &str) -> bool {
    let query =
        Query::for_model("sqlite_master").with_filter("type = 'table' AND name = ?", args![table]);
    ds.exists(&query).await.expect("failed to probe sqlite_master")
}

/// A member of the `accounts` feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

impl Member {
    pub fn new(name: &str) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase())),
        }
    }
}

impl Entity for Member {
    const MODEL: &'static str = "members";
    const ID_PREFIX: &'static str = "mbr";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}
