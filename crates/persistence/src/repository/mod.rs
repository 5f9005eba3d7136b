//! Typed repositories.
//!
//! [`Repository`] is the persistence surface for application code. It is
//! generic over a [`Binding`] deciding where each call's data source comes
//! from:
//!
//! - [`ContextRepo`] resolves it from the caller's
//!   [`TenantContext`](crate::tenant::TenantContext), for request handlers
//! - [`TenantRepo`] is bound once to a tenant, for background work
//!
//! Both flavors share every operation.
//!
//! # Example
//!
//! ```ignore
//! use strata_persistence::repository::{ContextRepo, TenantRepo};
//!
//! let users: ContextRepo<User> = ContextRepo::new()
//!     .with_pre_create(|user| {
//!         user.email = user.email.to_lowercase();
//!         Ok(())
//!     });
//! let created = users.create(&ctx, User::new("Ann", "ANN@example.com")).await?;
//!
//! let nightly: TenantRepo<User> = TenantRepo::for_tenant(&sources, &TenantId::new("acme"))?;
//! let inactive = nightly.count_by((), "active = ?", args![false]).await?;
//! ```

mod binding;
mod hooks;
mod listing;
mod repo;

pub use binding::{Binding, ContextBinding, TenantBinding};
pub use hooks::{Hook, RepoHooks};
pub use repo::{ContextRepo, Repository, TenantRepo};
