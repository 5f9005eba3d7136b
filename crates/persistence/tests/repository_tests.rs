//! Repository integration tests against the SQLite data source.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use regex::Regex;
use serde_json::json;

use common::*;
use strata_persistence::args;
use strata_persistence::backends::sqlite::{SqliteConfig, SqliteDataSource};
use strata_persistence::core::DataSource;
use strata_persistence::error::{ErrorKind, StorageError, ValidationError};
use strata_persistence::repository::{ContextRepo, TenantRepo};
use strata_persistence::tenant::{TenantContext, TenantId};
use strata_persistence::types::{FilterInput, Paging, Row};

fn fields(value: serde_json::Value) -> Row {
    value.as_object().cloned().unwrap()
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_assigns_prefixed_id() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let created = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    let pattern = Regex::new(r"^usr_[A-Za-z0-9]+$").unwrap();
    assert!(pattern.is_match(&created.id), "unexpected id {}", created.id);
}

#[tokio::test]
async fn test_create_then_find_by_id_round_trips() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let created = users
        .create(&ctx, User::new("Ann", 31).with_tags(&["admin", "ops"]).inactive())
        .await
        .unwrap();
    let found = users.find_by_id(&ctx, &created.id).await.unwrap().unwrap();

    assert_eq!(found, created);
}

#[tokio::test]
async fn test_create_keeps_supplied_id() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let created = users
        .create(&ctx, User::new("Ann", 31).with_id("usr_fixed"))
        .await
        .unwrap();
    assert_eq!(created.id, "usr_fixed");
}

#[tokio::test]
async fn test_create_without_prefix_requires_id() {
    let ctx = create_context("acme").await;
    let settings: ContextRepo<Setting> = ContextRepo::new();

    let err = settings
        .create(&ctx, Setting { id: String::new(), value: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::MissingIdPrefix { .. })
    ));

    let stored = settings
        .create(&ctx, Setting { id: "theme".into(), value: "dark".into() })
        .await
        .unwrap();
    assert_eq!(stored.id, "theme");
}

#[tokio::test]
async fn test_batch_ids_never_collide() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let batch: Vec<User> = (0..200).map(|i| User::new(&format!("u{i}"), i)).collect();
    let created = users.create_all(&ctx, batch).await.unwrap();

    let ids: HashSet<_> = created.iter().map(|u| u.id.clone()).collect();
    assert_eq!(ids.len(), 200);
    assert_eq!(users.count_all(&ctx).await.unwrap(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_unique_ids() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteConfig::new(dir.path().join("acme.db").to_string_lossy().into_owned());
    let ds: Arc<dyn DataSource> =
        Arc::new(SqliteDataSource::open(TenantId::new("acme"), &config).unwrap());
    ds.raw(USERS_SCHEMA, args![]).await.unwrap();
    let ctx = TenantContext::new(ds);
    let users: Arc<ContextRepo<User>> = Arc::new(ContextRepo::new());

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let ctx = ctx.clone();
            let users = Arc::clone(&users);
            tokio::spawn(async move { users.create(&ctx, User::new(&format!("u{i}"), i)).await })
        })
        .collect();

    let mut ids = HashSet::new();
    for task in tasks {
        let created = task.await.unwrap().unwrap();
        ids.insert(created.id);
    }

    let pattern = Regex::new(r"^usr_[A-Za-z0-9]+$").unwrap();
    assert_eq!(ids.len(), 64);
    assert!(ids.iter().all(|id| pattern.is_match(id)));
    assert_eq!(users.count_all(&ctx).await.unwrap(), 64);
}

#[tokio::test]
async fn test_pre_create_hook_runs_once_per_element_in_order() {
    let ctx = create_context("acme").await;
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = seen.clone();
    let users: ContextRepo<User> = ContextRepo::new().with_pre_create(move |user: &mut User| {
        log.lock().push(user.name.clone());
        user.email = user.email.to_uppercase();
        Ok(())
    });

    let created = users
        .create_all(&ctx, vec![User::new("Ann", 1), User::new("Bob", 2)])
        .await
        .unwrap();

    assert_eq!(*seen.lock(), vec!["Ann".to_string(), "Bob".to_string()]);
    assert_eq!(created[0].email, "ANN@EXAMPLE.COM");
    let stored = users.find_by_id(&ctx, &created[1].id).await.unwrap().unwrap();
    assert_eq!(stored.email, "BOB@EXAMPLE.COM");
}

#[tokio::test]
async fn test_failing_hook_prevents_write() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new().with_pre_create(|user: &mut User| {
        if user.name.is_empty() {
            return Err(ValidationError::MissingRequiredField {
                field: "name".into(),
            }
            .into());
        }
        Ok(())
    });

    let result = users
        .create_all(&ctx, vec![User::new("Ann", 1), User::new("", 2)])
        .await;
    assert!(result.is_err());
    assert_eq!(users.count_all(&ctx).await.unwrap(), 0);
}

#[tokio::test]
async fn test_create_all_is_all_or_nothing() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    users
        .create(&ctx, User::new("Ann", 1).with_id("usr_taken"))
        .await
        .unwrap();

    let result = users
        .create_all(
            &ctx,
            vec![User::new("Bob", 2), User::new("Eve", 3).with_id("usr_taken")],
        )
        .await;

    assert!(result.is_err());
    assert_eq!(users.count_all(&ctx).await.unwrap(), 1);
}

#[tokio::test]
async fn test_create_all_empty_is_noop() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    assert!(users.create_all(&ctx, vec![]).await.unwrap().is_empty());
}

// ============================================================================
// Update / Merge / Patch
// ============================================================================

#[tokio::test]
async fn test_update_overwrites_record() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let mut ann = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    ann.name = "Annie".into();
    ann.age = None;
    users.update(&ctx, ann.clone()).await.unwrap();

    let found = users.find_by_id(&ctx, &ann.id).await.unwrap().unwrap();
    assert_eq!(found.name, "Annie");
    assert_eq!(found.age, None);
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let err = users
        .update(&ctx, User::new("Ghost", 1).with_id("usr_missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.kind(), ErrorKind::Functional);
}

#[tokio::test]
async fn test_update_all_is_all_or_nothing() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let mut ann = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    ann.name = "Changed".into();
    let result = users
        .update_all(&ctx, vec![ann.clone(), User::new("Ghost", 1).with_id("usr_missing")])
        .await;

    assert!(result.unwrap_err().is_not_found());
    let found = users.find_by_id(&ctx, &ann.id).await.unwrap().unwrap();
    assert_eq!(found.name, "Ann");
}

#[tokio::test]
async fn test_pre_update_hook_runs_on_update_and_merge() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new().with_pre_update(|user: &mut User| {
        user.tags.push("touched".into());
        Ok(())
    });
    let ann = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    users.update(&ctx, ann.clone()).await.unwrap();
    let merged = users
        .merge(&ctx, &ann.id, |user| {
            user.age = Some(32);
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(merged.tags, vec!["touched", "touched"]);
    assert_eq!(merged.age, Some(32));
}

#[tokio::test]
async fn test_merge_applies_mutation_and_persists() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let ann = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    users
        .merge(&ctx, &ann.id, |user| {
            user.active = false;
            user.id = "usr_hijacked".into();
            Ok(())
        })
        .await
        .unwrap();

    let found = users.find_by_id(&ctx, &ann.id).await.unwrap().unwrap();
    assert!(!found.active);
    assert!(!users.exists_by_id(&ctx, "usr_hijacked").await.unwrap());
}

#[tokio::test]
async fn test_merge_missing_is_not_found_without_write() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let mut called = false;

    let err = users
        .merge(&ctx, "usr_missing", |_| {
            called = true;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!called);
    assert_eq!(users.count_all(&ctx).await.unwrap(), 0);
}

#[tokio::test]
async fn test_patch_updates_only_given_fields() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let ann = users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    let changed = users
        .patch(&ctx, &ann.id, fields(json!({"age": 40, "tags": ["x"]})))
        .await
        .unwrap();
    assert_eq!(changed, 1);

    let found = users.find_by_id(&ctx, &ann.id).await.unwrap().unwrap();
    assert_eq!(found.age, Some(40));
    assert_eq!(found.tags, vec!["x"]);
    assert_eq!(found.name, "Ann");
}

#[tokio::test]
async fn test_patch_missing_returns_zero() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();

    let changed = users
        .patch(&ctx, "usr_missing", fields(json!({"age": 1})))
        .await
        .unwrap();
    assert_eq!(changed, 0);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_by_id_and_by_filter() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let created = users
        .create_all(
            &ctx,
            vec![User::new("Ann", 20), User::new("Bob", 30), User::new("Cid", 40)],
        )
        .await
        .unwrap();

    users.delete_by_id(&ctx, &created[0].id).await.unwrap();
    users.delete_by(&ctx, "age >= ?", args![40]).await.unwrap();

    let rest = users.find_all(&ctx).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name, "Bob");
}

#[tokio::test]
async fn test_delete_missing_id_is_not_an_error() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    users.delete_by_id(&ctx, "usr_missing").await.unwrap();
}

#[tokio::test]
async fn test_delete_without_filter_is_rejected() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    users.create(&ctx, User::new("Ann", 20)).await.unwrap();

    let err = users.delete_by(&ctx, "", args![]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(users.count_all(&ctx).await.unwrap(), 1);
}

// ============================================================================
// Reads
// ============================================================================

async fn seed(ctx: &strata_persistence::TenantContext, users: &ContextRepo<User>) -> Vec<User> {
    users
        .create_all(
            ctx,
            vec![
                User::new("Cid", 40).with_id("usr_c"),
                User::new("Ann", 20).with_id("usr_a"),
                User::new("Bob", 30).with_id("usr_b").inactive(),
            ],
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_find_all_sorted_and_find_by_sorted() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    let by_age: Vec<_> = users
        .find_all_sorted(&ctx, "age DESC")
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(by_age, vec!["Cid", "Bob", "Ann"]);

    let active: Vec<_> = users
        .find_by_sorted(&ctx, "active = ?", args![true], "name")
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(active, vec!["Ann", "Cid"]);
}

#[tokio::test]
async fn test_find_by_ids_expands_list() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    let found = users
        .find_by_ids(&ctx, &["usr_a", "usr_c", "usr_missing"])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);

    let none: Vec<String> = vec![];
    assert!(users.find_by_ids(&ctx, &none).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_by_absent_is_none() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    assert!(users
        .first_by(&ctx, "name = ?", args!["Zed"])
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        users
            .first_by(&ctx, "name = ?", args!["Bob"])
            .await
            .unwrap()
            .map(|u| u.id),
        Some("usr_b".to_string())
    );
}

#[tokio::test]
async fn test_probes() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    assert!(users.exists_by(&ctx, "age > ?", args![35]).await.unwrap());
    assert!(!users.exists_by(&ctx, "age > ?", args![99]).await.unwrap());
    assert!(users.exists_by_id(&ctx, "usr_a").await.unwrap());
    assert_eq!(users.count_by(&ctx, "active = ?", args![false]).await.unwrap(), 1);
    assert_eq!(users.count_all(&ctx).await.unwrap(), 3);
}

#[tokio::test]
async fn test_find_by_into_projects() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    let summaries: Vec<UserSummary> = users
        .find_by_into(&ctx, "age < ?", args![35])
        .await
        .unwrap();
    let mut names: Vec<_> = summaries.into_iter().map(|s| s.name).collect();
    names.sort();
    assert_eq!(names, vec!["Ann", "Bob"]);
}

#[tokio::test]
async fn test_query_and_raw_escape_hatches() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    seed(&ctx, &users).await;

    let changed = users
        .raw(&ctx, "UPDATE users SET age = age + 1 WHERE id in (?)", args![vec!["usr_a", "usr_b"]])
        .await
        .unwrap();
    assert_eq!(changed, 2);

    let rows: Vec<UserSummary> = users
        .query(
            &ctx,
            "SELECT id, name FROM users WHERE age in (?) ORDER BY id",
            args![vec![21, 31]],
        )
        .await
        .unwrap();
    assert_eq!(
        rows.into_iter().map(|r| r.id).collect::<Vec<_>>(),
        vec!["usr_a", "usr_b"]
    );
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_pages_in_id_order() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let batch: Vec<User> = (1..=25)
        .map(|i| User::new(&format!("user{i}"), i).with_id(&format!("usr_{i:02}")))
        .collect();
    users.create_all(&ctx, batch).await.unwrap();

    let first = users.list(&ctx, Paging::default()).await.unwrap();
    assert_eq!(first.page, 1);
    assert_eq!(first.count, 1000);
    assert_eq!(first.len(), 25);

    let second = users.list(&ctx, Paging::new(2, 10)).await.unwrap();
    let ids: Vec<_> = second.data.iter().map(|u| u.id.clone()).collect();
    let expected: Vec<_> = (11..=20).map(|i| format!("usr_{i:02}")).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_list_clips_oversized_page() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    users.create(&ctx, User::new("Ann", 1)).await.unwrap();

    let page = users.list(&ctx, Paging::new(1, 50_000)).await.unwrap();
    assert_eq!(page.count, 1000);
    assert_eq!(page.len(), 1);
}

#[tokio::test]
async fn test_search_with_filter_and_paging() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    let batch: Vec<User> = (1..=30)
        .map(|i| User::new(&format!("user{i}"), i).with_id(&format!("usr_{i:02}")))
        .collect();
    users.create_all(&ctx, batch).await.unwrap();

    let input = FilterInput::new("age > ?", args![10]).with_paging(Paging::new(2, 5));
    let page = users.search(&ctx, input).await.unwrap();
    let ids: Vec<_> = page.data.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec!["usr_16", "usr_17", "usr_18", "usr_19", "usr_20"]);

    let sorted = users
        .search(&ctx, FilterInput::new("age <= ?", args![3]).with_sort("age DESC"))
        .await
        .unwrap();
    assert_eq!(sorted.data[0].id, "usr_03");
}

#[tokio::test]
async fn test_search_rejects_arguments_without_filter() {
    let ctx = create_context("acme").await;
    let users: ContextRepo<User> = ContextRepo::new();
    users.create(&ctx, User::new("Ann", 31)).await.unwrap();

    let input = FilterInput {
        args: args!["Ann"],
        ..FilterInput::default()
    };
    let err = users.search(&ctx, input).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::ArgumentMismatch { expected: 0, actual: 1 })
    ));

    let everything = users.search(&ctx, FilterInput::default()).await.unwrap();
    assert_eq!(everything.len(), 1);
}

// ============================================================================
// Tenant binding
// ============================================================================

#[tokio::test]
async fn test_tenant_repo_matches_context_repo() {
    let sources = create_sources(&["acme"]).await;
    let acme = strata_persistence::TenantId::new("acme");

    let bound: TenantRepo<User> = TenantRepo::for_tenant(&sources, &acme).unwrap();
    let created = bound.create((), User::new("Ann", 31)).await.unwrap();

    let ctx = strata_persistence::TenantContext::for_tenant(&sources, &acme).unwrap();
    let users: ContextRepo<User> = ContextRepo::new();
    assert_eq!(users.find_by_id(&ctx, &created.id).await.unwrap(), Some(created));
    assert_eq!(bound.count_all(()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_tenant_repo_for_unknown_tenant_fails() {
    let sources = create_sources(&["acme"]).await;
    let err = TenantRepo::<User>::for_tenant(&sources, &strata_persistence::TenantId::new("nope"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}
