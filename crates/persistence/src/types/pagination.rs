//! Page-based listing types.
//!
//! Listing endpoints take a 1-based page and a page size. Missing or
//! non-positive values fall back to the first page and [`DEFAULT_PAGE_SIZE`];
//! oversized pages are clipped to [`MAX_PAGE_SIZE`].

use serde::{Deserialize, Serialize};

use super::query::SqlValue;

/// The first page.
pub const DEFAULT_PAGE: u32 = 1;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Largest page size a caller can ask for.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A requested page.
///
/// # Examples
///
/// ```
/// use strata_persistence::types::Paging;
///
/// let paging = Paging::new(2, 10);
/// assert_eq!(paging.offset(), 10);
/// assert_eq!(paging.limit(), 10);
///
/// let defaults = Paging::default();
/// assert_eq!(defaults.page(), 1);
/// assert_eq!(defaults.limit(), 1000);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// 1-based page number; `0` means the first page.
    #[serde(default)]
    pub page: u32,

    /// Page size; `0` means the default size.
    #[serde(default)]
    pub count: u32,
}

impl Paging {
    /// Creates a paging request.
    pub fn new(page: u32, count: u32) -> Self {
        Self { page, count }
    }

    /// The effective 1-based page.
    pub fn page(&self) -> u32 {
        self.page.max(DEFAULT_PAGE)
    }

    /// The effective page size.
    pub fn limit(&self) -> u64 {
        u64::from(self.count())
    }

    /// The effective page size as requested, after defaulting and clipping.
    pub fn count(&self) -> u32 {
        match self.count {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip to reach the page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * self.limit()
    }
}

/// A filtered search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterInput {
    /// The where clause with `?` placeholders.
    #[serde(rename = "where", default)]
    pub where_clause: Option<String>,

    /// Positional arguments for the placeholders.
    #[serde(default)]
    pub args: Vec<SqlValue>,

    /// Optional `ORDER BY` fragment; listings sort by id otherwise.
    #[serde(default)]
    pub sort: Option<String>,

    /// The requested page.
    #[serde(default)]
    pub paging: Paging,
}

impl FilterInput {
    /// Creates a filter over the given clause.
    pub fn new(where_clause: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            where_clause: Some(where_clause.into()),
            args,
            ..Self::default()
        }
    }

    /// Sets the page.
    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    /// Sets the sort.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }
}

/// One page of entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityList<T> {
    /// The entities on this page.
    pub data: Vec<T>,
    /// The effective page number.
    pub page: u32,
    /// The effective page size.
    pub count: u32,
}

impl<T> EntityList<T> {
    /// Wraps a page of results.
    pub fn new(data: Vec<T>, paging: Paging) -> Self {
        Self {
            data,
            page: paging.page(),
            count: paging.count(),
        }
    }

    /// Number of entities on this page.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the page is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
