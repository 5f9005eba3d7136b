//! Error types for the persistence layer.
//!
//! This module defines all error types used throughout the persistence layer,
//! following a hierarchy that separates resource errors, tenant errors,
//! validation errors, transaction errors and backend errors.
//!
//! Every [`StorageError`] also maps onto one of three coarse categories
//! ([`ErrorKind`]) so callers can decide how to react without matching on
//! every variant.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

use crate::tenant::TenantId;

/// The primary error type for all storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Record state errors
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Tenant resolution errors
    #[error(transparent)]
    Tenant(#[from] TenantError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Transaction errors
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connectivity, driver, serialization or closed-handle failures.
    Infra,
    /// A record required by the operation does not exist.
    Functional,
    /// The request itself is malformed or misconfigured.
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Infra => write!(f, "infra"),
            ErrorKind::Functional => write!(f, "functional"),
            ErrorKind::Validation => write!(f, "validation"),
        }
    }
}

impl StorageError {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Resource(ResourceError::NotFound { .. }) => ErrorKind::Functional,
            StorageError::Resource(ResourceError::AlreadyExists { .. }) => ErrorKind::Validation,
            StorageError::Tenant(_) | StorageError::Validation(_) => ErrorKind::Validation,
            StorageError::Transaction(TransactionError::NestedNotSupported) => {
                ErrorKind::Validation
            }
            StorageError::Transaction(_) | StorageError::Backend(_) => ErrorKind::Infra,
        }
    }

    /// Returns `true` if this is a "record not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Resource(ResourceError::NotFound { .. }))
    }

    /// Returns `true` if the data source was already closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, StorageError::Backend(BackendError::Closed { .. }))
    }

    /// Shorthand for a not-found error on `model`/`id`.
    pub fn not_found(model: impl Into<String>, id: impl Into<String>) -> Self {
        StorageError::Resource(ResourceError::NotFound {
            model: model.into(),
            id: id.into(),
        })
    }
}

/// Errors related to record state.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The requested record was not found.
    #[error("record not found: {model}/{id}")]
    NotFound { model: String, id: String },

    /// A record with the given ID already exists.
    #[error("record already exists: {model}/{id}")]
    AlreadyExists { model: String, id: String },
}

/// Errors related to tenant resolution.
#[derive(Error, Debug)]
pub enum TenantError {
    /// No data source is registered for the tenant.
    #[error("invalid tenant: {tenant_id}")]
    InvalidTenant { tenant_id: TenantId },

    /// Two data sources were registered for the same tenant.
    #[error("duplicate data source for tenant {tenant_id}")]
    DuplicateDataSource { tenant_id: TenantId },
}

/// Errors related to malformed requests or entity configuration.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// The entity has no id prefix, so no identifier can be generated.
    #[error("entity '{model}' is missing an id prefix")]
    MissingIdPrefix { model: String },

    /// A model or column name is not a plain SQL identifier.
    #[error("invalid identifier: {name}")]
    InvalidIdentifier { name: String },

    /// The number of positional arguments does not match the placeholders.
    #[error("statement expects {expected} arguments, got {actual}")]
    ArgumentMismatch { expected: usize, actual: usize },

    /// The statement uses a placeholder form other than a bare `?`.
    #[error("unsupported placeholder: {placeholder}")]
    UnsupportedPlaceholder { placeholder: String },

    /// The operation needs a where clause.
    #[error("{operation} requires a where clause")]
    MissingFilter { operation: String },

    /// The operation needs a model hint on the query.
    #[error("{operation} requires a model")]
    MissingModel { operation: String },

    /// The query needs a raw statement.
    #[error("{operation} requires a raw statement")]
    MissingStatement { operation: String },

    /// A record did not serialize to a column map.
    #[error("record for '{model}' must serialize to an object")]
    NotAnObject { model: String },

    /// Missing required field.
    #[error("missing required field: {field}")]
    MissingRequiredField { field: String },
}

/// Errors related to transactions.
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Transaction was rolled back.
    #[error("transaction rolled back: {reason}")]
    RolledBack { reason: String },

    /// Transaction is no longer valid (already committed or rolled back).
    #[error("transaction no longer valid")]
    InvalidTransaction,

    /// Nested transactions not supported.
    #[error("nested transactions not supported")]
    NestedNotSupported,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// The data source was closed; no further operations are accepted.
    #[error("data source for tenant {tenant_id} is closed")]
    Closed { tenant_id: TenantId },

    /// Schema migration error.
    #[error("schema migration failed: {message}")]
    MigrationError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// Implement conversions from common error types

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
