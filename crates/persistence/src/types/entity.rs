//! Persistable entities and identifier generation.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{StorageResult, ValidationError};

use super::query::Row;

/// Name of the identifier column every model carries.
pub const ID_COLUMN: &str = "id";

/// A record type stored in a model (table).
///
/// Entities map to rows through serde: field names are column names.
/// Identifiers are strings of the form `<prefix>_<unique suffix>`.
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use strata_persistence::types::Entity;
///
/// #[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// struct Invoice {
///     id: String,
///     total: i64,
/// }
///
/// impl Entity for Invoice {
///     const MODEL: &'static str = "invoices";
///     const ID_PREFIX: &'static str = "inv";
///
///     fn id(&self) -> &str {
///         &self.id
///     }
///
///     fn set_id(&mut self, id: String) {
///         self.id = id;
///     }
/// }
///
/// let mut invoice = Invoice::default();
/// assert!(invoice.ensure_id().unwrap());
/// assert!(invoice.id.starts_with("inv_"));
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The model (table) name.
    const MODEL: &'static str;

    /// Prefix for generated identifiers. Empty means ids must be supplied.
    const ID_PREFIX: &'static str;

    /// The identifier, empty if not yet assigned.
    fn id(&self) -> &str;

    /// Replaces the identifier.
    fn set_id(&mut self, id: String);

    /// Assigns a fresh identifier if none is set.
    ///
    /// Returns `true` if an id was generated.
    fn ensure_id(&mut self) -> StorageResult<bool> {
        if !self.id().is_empty() {
            return Ok(false);
        }
        if Self::ID_PREFIX.is_empty() {
            return Err(ValidationError::MissingIdPrefix {
                model: Self::MODEL.to_string(),
            }
            .into());
        }
        self.set_id(new_id(Self::ID_PREFIX));
        Ok(true)
    }

    /// Serializes the entity into a row.
    fn to_row(&self) -> StorageResult<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(ValidationError::NotAnObject {
                model: Self::MODEL.to_string(),
            }
            .into()),
        }
    }

    /// Deserializes an entity from a row.
    fn from_row(row: Row) -> StorageResult<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Generates a unique identifier with the given prefix.
///
/// The prefix and suffix are joined with `_` unless the prefix already ends
/// with `_` or `-`.
pub fn new_id(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple();
    if prefix.is_empty() || prefix.ends_with('_') || prefix.ends_with('-') {
        format!("{prefix}{suffix}")
    } else {
        format!("{prefix}_{suffix}")
    }
}
