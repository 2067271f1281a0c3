//! # Domain Errors
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  pearl-core errors (this file)                                          │
//! │  ├── CoreError        - Order and stock rule violations                 │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  pearl-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  pearl-ledger errors (separate crate)                                   │
//! │  └── LedgerError      - What callers of the services see                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError ← DbError              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by pure pearl-core logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An order was submitted with no lines.
    #[error("Order must contain at least one line")]
    EmptyOrder,

    /// Order has more lines than a terminal can legitimately produce.
    #[error("Order cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// Line quantity outside `1..=MAX_LINE_QUANTITY`.
    #[error("Quantity {requested} on line {position} is outside 1..={max}")]
    InvalidLineQuantity {
        position: usize,
        requested: i64,
        max: i64,
    },

    /// Stock movement quantity that must be strictly positive was not.
    ///
    /// ## When This Occurs
    /// - `stock_in` with zero or negative quantity
    /// - `waste` with zero or negative quantity
    #[error("Stock quantity must be positive, got {0}")]
    NonPositiveStockQuantity(String),

    /// A movement or the balance it produces is above `MAX_STOCK_QUANTITY`.
    #[error("Stock quantity {quantity} exceeds the limit of {max}")]
    StockLimitExceeded { quantity: String, max: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
