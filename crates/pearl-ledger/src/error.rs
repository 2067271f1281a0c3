//! # Ledger Error Types
//!
//! The error surface of every service in this crate.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Error Categories                            │
//! │                                                                         │
//! │  Validation  bad input, rejected before any transaction opens           │
//! │  Conflict    illegal state (open shift exists, shift already closed,    │
//! │              duplicate order, order already cancelled)                  │
//! │  NotFound    mutation of an entity that does not exist                  │
//! │  Config      ledger.toml / environment problems                         │
//! │  Database    storage failures; `is_retryable()` for lock timeouts       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use pearl_core::{CoreError, ValidationError};
use pearl_db::DbError;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Input failed a business rule.
    #[error("Validation failed: {0}")]
    Validation(#[from] CoreError),

    /// The operation is not legal in the current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid or unreadable configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(DbError),
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict(message.into())
    }

    /// The same call may succeed if retried (lock timeout, pool exhausted).
    /// The offline queue relies on this: retried orders are deduplicated.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Database(e) if e.is_retryable())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Validation(CoreError::Validation(err))
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Database(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}
