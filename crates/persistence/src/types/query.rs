//! The declarative query descriptor and positional argument values.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StorageResult, ValidationError};

use super::pagination::Paging;

/// A record as a column-name → value map.
pub type Row = serde_json::Map<String, Value>;

/// A positional argument bound to a `?` placeholder.
///
/// A [`SqlValue::List`] bound to a placeholder expands to one placeholder per
/// element at execution time, so `id in (?)` works with a list of ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// Boolean, stored as `0`/`1`.
    Bool(bool),
    /// 64-bit integer.
    Integer(i64),
    /// Double precision float.
    Real(f64),
    /// Text.
    Text(String),
    /// A sequence, expanded in place.
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Converts a JSON value into an argument. Arrays become lists, objects
    /// are bound as their JSON text.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s),
            Value::Array(items) => SqlValue::List(items.into_iter().map(Self::from_json).collect()),
            Value::Object(_) => SqlValue::Text(value.to_string()),
        }
    }

    fn flatten_into(self, out: &mut Vec<SqlValue>) {
        match self {
            SqlValue::List(items) => items.into_iter().for_each(|v| v.flatten_into(out)),
            scalar => out.push(scalar),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        SqlValue::from_json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        SqlValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<SqlValue>> From<&[T]> for SqlValue {
    fn from(v: &[T]) -> Self {
        SqlValue::List(v.iter().cloned().map(Into::into).collect())
    }
}

/// Builds a `Vec<SqlValue>` from heterogeneous expressions.
///
/// ```
/// use strata_persistence::args;
/// use strata_persistence::types::SqlValue;
///
/// let args = args!["acme", 42, true];
/// assert_eq!(args[1], SqlValue::Integer(42));
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::types::SqlValue>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::types::SqlValue::from($value)),+]
    };
}

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Checks that `name` is a plain SQL identifier (model or column name).
pub fn validate_identifier(name: &str) -> StorageResult<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(ValidationError::InvalidIdentifier {
            name: name.to_string(),
        }
        .into())
    }
}

/// Where [`expand_placeholders`] is in the statement text.
#[derive(Clone, Copy)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Rewrites `sql` so that every list argument gets one placeholder per
/// element, and returns the flattened scalar arguments.
///
/// Only bare `?` placeholders are supported; numbered ones such as `?1`
/// are rejected. Placeholders inside quoted strings, identifiers and
/// comments are left alone. An empty list expands to `NULL` so `x in (?)`
/// matches nothing.
pub fn expand_placeholders(sql: &str, args: &[SqlValue]) -> StorageResult<(String, Vec<SqlValue>)> {
    let mut out = String::with_capacity(sql.len());
    let mut flat = Vec::with_capacity(args.len());
    let mut scan = Scan::Code;
    let mut placeholders = 0usize;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match scan {
            Scan::Quoted(q) => {
                if c == q {
                    scan = Scan::Code;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    scan = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    out.push(c);
                    out.push('/');
                    chars.next();
                    scan = Scan::Code;
                    continue;
                }
            }
            Scan::Code => match c {
                '\'' | '"' | '`' => scan = Scan::Quoted(c),
                '-' if chars.peek() == Some(&'-') => scan = Scan::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    out.push_str("/*");
                    chars.next();
                    scan = Scan::BlockComment;
                    continue;
                }
                '?' => {
                    if let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
                        return Err(ValidationError::UnsupportedPlaceholder {
                            placeholder: format!("?{d}"),
                        }
                        .into());
                    }
                    match args.get(placeholders) {
                        Some(SqlValue::List(items)) => {
                            let before = flat.len();
                            SqlValue::List(items.clone()).flatten_into(&mut flat);
                            let n = flat.len() - before;
                            if n == 0 {
                                out.push_str("NULL");
                            } else {
                                out.push_str(&vec!["?"; n].join(", "));
                            }
                        }
                        Some(scalar) => {
                            flat.push(scalar.clone());
                            out.push('?');
                        }
                        None => out.push('?'),
                    }
                    placeholders += 1;
                    continue;
                }
                _ => {}
            },
        }
        out.push(c);
    }

    if placeholders != args.len() {
        return Err(ValidationError::ArgumentMismatch {
            expected: placeholders,
            actual: args.len(),
        }
        .into());
    }
    Ok((out, flat))
}

/// An immutable filter/sort/pagination descriptor.
///
/// Builder methods consume the query and return a new one, so a query value
/// never changes once handed to a data source.
///
/// # Examples
///
/// ```
/// use strata_persistence::args;
/// use strata_persistence::types::{Paging, Query};
///
/// let query = Query::for_model("users")
///     .with_filter("active = ? AND age > ?", args![true, 18])
///     .with_sort("name ASC")
///     .paginate(Paging::new(2, 10));
///
/// assert_eq!(query.model(), Some("users"));
/// assert_eq!(query.offset(), 10);
/// assert_eq!(query.limit(), Some(10));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    model: Option<String>,
    raw: Option<String>,
    filter: Option<String>,
    args: Vec<SqlValue>,
    sort: Option<String>,
    select: Option<String>,
    offset: u64,
    limit: Option<u64>,
}

impl Query {
    /// Creates an empty query (no model, no filter, no limit).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query over the given model (table).
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    /// Creates a raw-statement query.
    pub fn raw_statement(sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        Self {
            raw: Some(sql.into()),
            args,
            ..Self::default()
        }
    }

    /// Sets the model hint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the where clause and its positional arguments.
    pub fn with_filter(mut self, filter: impl Into<String>, args: Vec<SqlValue>) -> Self {
        let filter = filter.into();
        self.filter = if filter.trim().is_empty() {
            None
        } else {
            Some(filter)
        };
        self.args = args;
        self
    }

    /// Sets a raw statement, replacing the declarative parts for reads.
    pub fn with_raw(mut self, sql: impl Into<String>, args: Vec<SqlValue>) -> Self {
        self.raw = Some(sql.into());
        self.args = args;
        self
    }

    /// Sets the `ORDER BY` fragment.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        let sort = sort.into();
        self.sort = if sort.trim().is_empty() {
            None
        } else {
            Some(sort)
        };
        self
    }

    /// Sets the projection (`SELECT` list).
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    /// Sets the number of rows to skip.
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Sets the maximum number of rows.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Translates 1-based paging into offset/limit.
    pub fn paginate(self, paging: Paging) -> Self {
        self.with_offset(paging.offset()).with_limit(paging.limit())
    }

    /// The model hint, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// The raw statement, if any.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// The where clause, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The positional arguments.
    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// The `ORDER BY` fragment, if any.
    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// The projection, if any.
    pub fn select(&self) -> Option<&str> {
        self.select.as_deref()
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of rows, if limited.
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }
}
