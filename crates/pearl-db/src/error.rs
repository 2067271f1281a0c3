//! # Database Errors
//!
//! `sqlx` failures sorted into the cases the ledger reacts to differently.
//!
//! ```text
//! sqlx::Error ──► DbError ──► LedgerError (pearl-ledger)
//!                   │
//!                   ├─ UniqueViolation       duplicate retry key, second open shift
//!                   ├─ ForeignKeyViolation   recipe for a missing material
//!                   ├─ CheckViolation        negative stock, broken totals
//!                   ├─ Busy / PoolExhausted  retryable contention
//!                   └─ everything else       surfaced as-is
//! ```

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// `field` holds SQLite's column list, e.g.
    /// `orders.device_id, orders.ordered_at`.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// The write lock stayed taken for longer than `busy_timeout`.
    #[error("Database is busy: {0}")]
    Busy(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A stored column could not be decoded (addons JSON).
    #[error("Corrupt data: {0}")]
    Corrupt(String),

    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Unique violation whose column list mentions `column`.
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        matches!(self, DbError::UniqueViolation { field, .. } if field.contains(column))
    }

    /// Lock or pool contention; the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Busy(_) | DbError::PoolExhausted)
    }
}

const UNIQUE_PREFIX: &str = "UNIQUE constraint failed: ";

/// SQLITE_BUSY and SQLITE_LOCKED. Extended codes (517 BUSY_SNAPSHOT,
/// 261 BUSY_RECOVERY, ...) share the low byte.
fn is_lock_code(code: Option<&str>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

fn classify(message: &str, code: Option<&str>) -> DbError {
    if let Some(columns) = message.strip_prefix(UNIQUE_PREFIX) {
        return DbError::duplicate(columns, "unknown");
    }
    if message.contains("FOREIGN KEY constraint failed") {
        return DbError::ForeignKeyViolation {
            message: message.to_string(),
        };
    }
    if message.contains("CHECK constraint failed") {
        return DbError::CheckViolation {
            message: message.to_string(),
        };
    }
    if is_lock_code(code) || message.contains("database is locked") {
        return DbError::Busy(message.to_string());
    }
    DbError::QueryFailed(message.to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => classify(db_err.message(), db_err.code().as_deref()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Corrupt(err.to_string())
    }
}
