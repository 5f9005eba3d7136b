//! Core value types for the persistence layer.
//!
//! - [`Entity`] - A record type stored in a model, with prefixed ids
//! - [`Query`], [`SqlValue`] - Declarative filter/sort/paging descriptor
//! - [`Paging`], [`FilterInput`], [`EntityList`] - Page-based listing
//!
//! # Examples
//!
//! ```
//! use strata_persistence::args;
//! use strata_persistence::types::{Paging, Query};
//!
//! let query = Query::for_model("users")
//!     .with_filter("email = ?", args!["a@example.com"])
//!     .paginate(Paging::default());
//!
//! assert_eq!(query.limit(), Some(1000));
//! ```

mod entity;
mod pagination;
mod query;

pub use entity::{Entity, ID_COLUMN, new_id};
pub use pagination::{
    DEFAULT_PAGE, DEFAULT_PAGE_SIZE, EntityList, FilterInput, MAX_PAGE_SIZE, Paging,
};
pub use query::{Query, Row, SqlValue, expand_placeholders, validate_identifier};
