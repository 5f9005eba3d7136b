//! Data source implementations.
//!
//! Each backend is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | Embedded database, one database per tenant |

#[cfg(feature = "sqlite")]
pub mod sqlite;
