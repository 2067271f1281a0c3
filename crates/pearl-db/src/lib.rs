//! # pearl-db: Database Layer for the Pearl POS Ledger
//!
//! SQLite storage for orders, stock and shifts, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pearl POS Data Flow                              │
//! │                                                                         │
//! │  pearl-ledger service (OrderIntake::create_order)                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     pearl-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐    │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │    │   │
//! │  │   │               │    │ OrderRepo      │   │ 001 orders   │    │   │
//! │  │   │ SqlitePool    │◄───│ SequenceRepo   │   │ 002 stock    │    │   │
//! │  │   │ busy_timeout  │    │ MaterialRepo.. │   │ 003 shifts   │    │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds of Repository Calls
//!
//! - `&self` methods run against the pool (single statement, autocommit).
//! - Associated functions taking `&mut SqliteConnection` run inside a
//!   transaction opened by the caller with [`Database::begin`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pearl_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./pearl.db")).await?;
//! let low = db.materials().list_low_stock().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::alert::AlertRepository;
pub use repository::material::MaterialRepository;
pub use repository::order::OrderRepository;
pub use repository::recipe::RecipeRepository;
pub use repository::sequence::SequenceRepository;
pub use repository::settlement::SettlementRepository;
pub use repository::shift::ShiftRepository;
pub use repository::stock_record::StockRecordRepository;

/// Transaction type handed to the `&mut SqliteConnection` repository functions.
pub type DbTransaction = sqlx::Transaction<'static, sqlx::Sqlite>;
